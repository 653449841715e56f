// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Payload type carried in the `PayloadType` header field (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PayloadType {
    Output,
    Error,
    Size,
    Parameter,
    HandshakeRequest,
    HandshakeResponse,
    HandshakeComplete,
    EncChallengeRequest,
    EncChallengeResponse,
    Flag,
    StdErr,
    ExitCode,
    /// A payload type value not in the known set. Frames carrying it are
    /// still framed/parsed correctly; only interpretation is unavailable.
    Unknown(u32),
}

impl PayloadType {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Output => 1,
            Self::Error => 2,
            Self::Size => 3,
            Self::Parameter => 4,
            Self::HandshakeRequest => 5,
            Self::HandshakeResponse => 6,
            Self::HandshakeComplete => 7,
            Self::EncChallengeRequest => 8,
            Self::EncChallengeResponse => 9,
            Self::Flag => 10,
            Self::StdErr => 11,
            Self::ExitCode => 12,
            Self::Unknown(v) => v,
        }
    }
}

impl From<u32> for PayloadType {
    fn from(v: u32) -> Self {
        match v {
            1 => Self::Output,
            2 => Self::Error,
            3 => Self::Size,
            4 => Self::Parameter,
            5 => Self::HandshakeRequest,
            6 => Self::HandshakeResponse,
            7 => Self::HandshakeComplete,
            8 => Self::EncChallengeRequest,
            9 => Self::EncChallengeResponse,
            10 => Self::Flag,
            11 => Self::StdErr,
            12 => Self::ExitCode,
            other => Self::Unknown(other),
        }
    }
}

/// Known `messageType` string literals (§6), exposed as `&'static str`
/// constants rather than an enum since the header field is free text
/// (unrecognized reader-side values round-trip as plain strings).
pub struct MessageType;

impl MessageType {
    pub const INTERACTIVE_SHELL: &'static str = "interactive_shell";
    pub const AGENT_TASK_REPLY: &'static str = "agent_task_reply";
    pub const AGENT_TASK_COMPLETE: &'static str = "agent_task_complete";
    pub const AGENT_TASK_ACKNOWLEDGE: &'static str = "agent_task_acknowledge";
    pub const ACKNOWLEDGE: &'static str = "acknowledge";
    pub const AGENT_SESSION_STATE: &'static str = "agent_session_state";
    pub const CHANNEL_CLOSED: &'static str = "channel_closed";
    pub const OUTPUT_STREAM_DATA: &'static str = "output_stream_data";
    pub const INPUT_STREAM_DATA: &'static str = "input_stream_data";
    pub const PAUSE_PUBLICATION: &'static str = "pause_publication";
    pub const START_PUBLICATION: &'static str = "start_publication";
    pub const AGENT_JOB: &'static str = "agent_job";
    pub const AGENT_JOB_ACK: &'static str = "agent_job_ack";
    pub const AGENT_JOB_REPLY_ACK: &'static str = "agent_job_reply_ack";
    pub const AGENT_JOB_REPLY: &'static str = "agent_job_reply";
    pub const CONTROL_CHANNEL_READY: &'static str = "control_channel_ready";
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MessageType")
    }
}
