// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Session plugin frame router (component I, §4.9): dispatches incoming
//! `Output`/`Size` payloads to a running pty backend, and runs the pty
//! write-pump that reassembles UTF-8 across chunk boundaries before
//! publishing `Output` frames and appending the on-disk transcript.

pub mod pty;
pub mod ring;
pub mod transcript;

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::error::{CodedError, ErrorCode};
use self::pty::BackendInput;
use self::transcript::SessionTranscript;
use ssm_wire::PayloadType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Terminating,
}

const CONTROL_SIGINT: u8 = 0x03;

/// Delivers SIGINT to a non-interactive plugin's child process (§4.9 table:
/// "scan payload for control signals"). Abstracted so the router is testable
/// without spawning a real process.
pub trait SignalSender: Send + Sync {
    fn send_sigint(&self, pid: u32) -> Result<(), CodedError>;
}

#[cfg(unix)]
pub struct UnixSignalSender;

#[cfg(unix)]
impl SignalSender for UnixSignalSender {
    fn send_sigint(&self, pid: u32) -> Result<(), CodedError> {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), nix::sys::signal::Signal::SIGINT)
            .map_err(|e| CodedError::new(ErrorCode::PluginPanic, format!("sigint delivery failed: {e}")))
    }
}

struct SessionHandles {
    input_tx: mpsc::Sender<BackendInput>,
    resize_tx: mpsc::Sender<(u16, u16)>,
    child_pid: Option<u32>,
}

/// Routes incoming frames to a session plugin. Holds channel handles rather
/// than the `Backend` itself so the pty's read/write loop and the router can
/// run as independent tasks, per §5's "each session plugin owns its own
/// loop".
pub struct SessionRouter {
    kind: SessionKind,
    state: SessionState,
    handles: Option<SessionHandles>,
    signal_sender: Box<dyn SignalSender>,
}

impl SessionRouter {
    pub fn new(kind: SessionKind, signal_sender: Box<dyn SignalSender>) -> Self {
        Self { kind, state: SessionState::Active, handles: None, signal_sender }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Called once the backend's `run` task is spawned and its channel
    /// handles are available.
    pub fn start(
        &mut self,
        input_tx: mpsc::Sender<BackendInput>,
        resize_tx: mpsc::Sender<(u16, u16)>,
        child_pid: Option<u32>,
    ) {
        self.handles = Some(SessionHandles { input_tx, resize_tx, child_pid });
    }

    /// Dispatches one incoming frame's payload per the §4.9 table. Returns
    /// `HandlerNotReady` before the backend has started so callers can
    /// retry — startup races are benign.
    pub async fn dispatch(&mut self, payload_type: PayloadType, payload: &Bytes) -> Result<(), CodedError> {
        let handles = self
            .handles
            .as_ref()
            .ok_or_else(|| CodedError::new(ErrorCode::HandlerNotReady, "session backend not started"))?;

        match (self.kind, payload_type) {
            (SessionKind::Interactive, PayloadType::Output) => send_write(handles, payload.clone()).await,
            (SessionKind::Interactive, PayloadType::Size) => {
                let size: SizePayload = serde_json::from_slice(payload).map_err(|e| {
                    CodedError::new(ErrorCode::FrameMalformed, format!("decode size payload: {e}"))
                })?;
                handles
                    .resize_tx
                    .send((size.cols, size.rows))
                    .await
                    .map_err(|_| CodedError::new(ErrorCode::HandlerNotReady, "resize channel closed"))
            }
            (SessionKind::NonInteractive, PayloadType::Output) => {
                self.deliver_to_child(handles, payload).await
            }
            (SessionKind::NonInteractive, PayloadType::Size) => {
                debug!("ignoring size frame for non-interactive session");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn deliver_to_child(&self, handles: &SessionHandles, payload: &Bytes) -> Result<(), CodedError> {
        match payload.iter().position(|&b| b == CONTROL_SIGINT) {
            Some(pos) => {
                if let Some(pid) = handles.child_pid {
                    self.signal_sender.send_sigint(pid)?;
                }
                let mut rest = payload.to_vec();
                rest.remove(pos);
                if rest.is_empty() {
                    Ok(())
                } else {
                    send_write(handles, Bytes::from(rest)).await
                }
            }
            None => send_write(handles, payload.clone()).await,
        }
    }

    /// Marks EOF observed on pty stdout, per §4.9's "loop exits on EOF,
    /// sending a session-state transition to Terminating".
    pub fn mark_terminating(&mut self) {
        self.state = SessionState::Terminating;
    }
}

async fn send_write(handles: &SessionHandles, data: Bytes) -> Result<(), CodedError> {
    handles
        .input_tx
        .send(BackendInput::Write(data))
        .await
        .map_err(|_| CodedError::new(ErrorCode::HandlerNotReady, "pty input channel closed"))
}

#[derive(serde::Deserialize)]
struct SizePayload {
    cols: u16,
    rows: u16,
}

/// Reassembles valid UTF-8 across chunk boundaries for the pty write-pump
/// (§4.9): bytes forming a partial rune at the chunk tail are held back for
/// the next call; invalid interior bytes pass through untouched, since the
/// published payload is raw bytes regardless of validity. Returns the prefix
/// of `carry ++ chunk` that is safe to publish now.
pub fn reassemble_utf8(carry: &mut Vec<u8>, chunk: &[u8]) -> Bytes {
    carry.extend_from_slice(chunk);
    let buf = std::mem::take(carry);

    let check_from = buf.len().saturating_sub(3);
    let mut cut = buf.len();
    for start in check_from..buf.len() {
        match std::str::from_utf8(&buf[start..]) {
            Ok(_) => break,
            Err(e) if e.valid_up_to() == 0 && e.error_len().is_none() => {
                cut = start;
                break;
            }
            Err(_) => continue,
        }
    }

    *carry = buf[cut..].to_vec();
    Bytes::from(buf[..cut].to_vec())
}

/// Runs the pty write-pump (§4.9): consumes stdout chunks from `output_rx`,
/// reassembles UTF-8 across boundaries, publishes each ready chunk on
/// `data_tx`, and appends it to `transcript`. Flips `router` to `Terminating`
/// once `output_rx` closes (EOF).
pub async fn run_output_pump(
    mut output_rx: mpsc::Receiver<Bytes>,
    data_tx: mpsc::Sender<Bytes>,
    transcript: Arc<SessionTranscript>,
    router: Arc<Mutex<SessionRouter>>,
) {
    let mut carry = Vec::new();

    while let Some(chunk) = output_rx.recv().await {
        let ready = reassemble_utf8(&mut carry, &chunk);
        if ready.is_empty() {
            continue;
        }
        if let Err(err) = transcript.append(&ready).await {
            warn!(error = %err, "failed to append session transcript");
        }
        if data_tx.send(ready).await.is_err() {
            break;
        }
    }

    if !carry.is_empty() {
        let tail = Bytes::from(carry);
        if let Err(err) = transcript.append(&tail).await {
            warn!(error = %err, "failed to append session transcript tail");
        }
        let _ = data_tx.send(tail).await;
    }

    router.lock().await.mark_terminating();
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
