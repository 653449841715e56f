// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Cooperative tri-state cancellation (§5, §9): `Running | ShutDown | Canceled`.
//! `ShutDown` is terminal and process-wide; `Canceled` is per-document. Built
//! on two [`tokio_util::sync::CancellationToken`]s composed the way the
//! teacher composes nested shutdown/drain tokens in its session loop, rather
//! than a single flag, since shutdown must also cancel every in-flight
//! document without each document needing its own shutdown plumbing.

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelTransition {
    Canceled,
    ShutDown,
}

/// Shared between a process-wide shutdown token and a per-document cancel
/// token. Cloning shares both tokens; cancelling `shutdown` is visible to
/// every clone across every document.
#[derive(Debug, Clone)]
pub struct CancelFlag {
    shutdown: CancellationToken,
    cancel: CancellationToken,
}

impl CancelFlag {
    /// A fresh flag with its own independent shutdown token — mainly useful
    /// for tests; production code derives per-document flags from a shared
    /// [`ShutdownSource`].
    pub fn new() -> Self {
        Self { shutdown: CancellationToken::new(), cancel: CancellationToken::new() }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.cancel.is_cancelled()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled() && !self.shutdown.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn shut_down(&self) {
        self.shutdown.cancel();
    }

    /// Blocks until either token fires, returning which one did. Shutdown
    /// wins ties since it is the terminal, non-recoverable state.
    pub async fn wait(&self) -> CancelTransition {
        tokio::select! {
            _ = self.shutdown.cancelled() => CancelTransition::ShutDown,
            _ = self.cancel.cancelled() => CancelTransition::Canceled,
        }
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the process-wide shutdown token and mints per-document [`CancelFlag`]s
/// that all share it.
#[derive(Debug, Clone)]
pub struct ShutdownSource {
    shutdown: CancellationToken,
}

impl ShutdownSource {
    pub fn new() -> Self {
        Self { shutdown: CancellationToken::new() }
    }

    pub fn shut_down(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn new_document_flag(&self) -> CancelFlag {
        CancelFlag { shutdown: self.shutdown.clone(), cancel: CancellationToken::new() }
    }
}

impl Default for ShutdownSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;
