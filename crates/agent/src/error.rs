// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

use std::fmt;

/// Machine-readable error taxonomy (spec §7), reused across the runner, the
/// reply formatter, and the channel manager so a log line's `code` field is
/// greppable across the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnknownPlugin,
    UnsupportedOnPlatform,
    PreconditionUnrecognized,
    PreconditionNotSatisfied,
    SubstitutionError,
    PluginPanic,
    ReplyTooLarge,
    TransportSendFailed,
    ReadyTimeout,
    FrameMalformed,
    NotInitialized,
    AccessDenied,
    HandlerNotReady,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownPlugin => "UNKNOWN_PLUGIN",
            Self::UnsupportedOnPlatform => "UNSUPPORTED_ON_PLATFORM",
            Self::PreconditionUnrecognized => "PRECONDITION_UNRECOGNIZED",
            Self::PreconditionNotSatisfied => "PRECONDITION_NOT_SATISFIED",
            Self::SubstitutionError => "SUBSTITUTION_ERROR",
            Self::PluginPanic => "PLUGIN_PANIC",
            Self::ReplyTooLarge => "REPLY_TOO_LARGE",
            Self::TransportSendFailed => "TRANSPORT_SEND_FAILED",
            Self::ReadyTimeout => "READY_TIMEOUT",
            Self::FrameMalformed => "FRAME_MALFORMED",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::HandlerNotReady => "HANDLER_NOT_READY",
        }
    }

    /// Whether a failure of this kind is worth retrying at the transport
    /// layer (§7 propagation policy).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportSendFailed | Self::NotInitialized | Self::ReadyTimeout | Self::HandlerNotReady
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error carrying a machine-readable [`ErrorCode`] alongside the
/// human-readable message `anyhow` call sites attach as context.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct CodedError {
    pub code: ErrorCode,
    pub message: String,
}

impl CodedError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
