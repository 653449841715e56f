// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Terminal backend abstraction (§4.9 expansion), matching the teacher's pty
//! module shape: one trait with one concrete `forkpty`-based implementation.

pub mod nbio;
pub mod spawn;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Result of a backend's child process exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Input sent to the backend: either raw bytes to write to the pty, or a
/// drain synchronization point.
#[derive(Debug)]
pub enum BackendInput {
    Write(Bytes),
    Drain(tokio::sync::oneshot::Sender<()>),
}

/// Object-safe so the session router can hold `Box<dyn Backend>` regardless
/// of which concrete terminal implementation spawned it.
pub trait Backend: Send + 'static {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        input_rx: mpsc::Receiver<BackendInput>,
        resize_rx: mpsc::Receiver<(u16, u16)>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>;

    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()>;

    fn child_pid(&self) -> Option<u32>;
}
