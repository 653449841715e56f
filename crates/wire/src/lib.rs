// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary wire format for the agent control channel.
//!
//! This crate is the one place that knows the fixed-layout `AgentMessage`
//! frame and the message-type / payload-type vocabulary carried on it. It has
//! no async runtime dependency and no opinion about transport — callers read
//! a full frame's bytes from wherever (a WebSocket message, a test fixture)
//! and hand them to [`AgentMessage::decode`].

mod frame;
mod payload;

pub use frame::{AgentMessage, FrameError, FLAG_FIN, FLAG_SYN, HEADER_LENGTH};
pub use payload::{MessageType, PayloadType};
