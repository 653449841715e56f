// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Control channel manager (component H, §4.8): token fetch, WebSocket open,
//! ready handshake, reconnect-with-backoff. The reconnect loop is grounded on
//! the teacher's `upstream::feed::spawn_event_feed` pattern (exponential
//! backoff, reset on success, cancellable via a token); the transport itself
//! is abstracted behind [`Transport`] so the state machine is testable
//! without a real socket.

use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::cancel::CancelFlag;
use crate::error::{CodedError, ErrorCode};
use crate::token::{ChannelToken, TokenProvider};
use ssm_wire::{AgentMessage, MessageType, PayloadType};

pub mod transport;
pub use transport::{WsDialer, WsTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Initialized,
    Opening,
    AwaitingReady,
    Ready,
    Reconnecting,
    Closed,
}

/// Observable health signal surfaced on repeated reconnect failure or
/// recovery (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSignal {
    MgsSuccess,
    MgsFailed,
    MgsFailedDueToAccessDenied,
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub ready_timeout: Duration,
    pub jitter_ratio: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            ready_timeout: Duration::from_secs(10),
            jitter_ratio: 0.2,
        }
    }
}

/// One live connection's read/write halves, abstracted so tests can supply
/// an in-memory double instead of a real WebSocket.
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn send(&mut self, bytes: Bytes) -> Result<(), CodedError>;
    /// `None` means the connection closed.
    async fn recv(&mut self) -> Option<Result<Bytes, CodedError>>;
}

#[async_trait::async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, websocket_url: &str) -> Result<Box<dyn Transport>, CodedError>;
}

/// Drives the state machine across one connection's lifetime, and across
/// reconnects. Owns the outbound channel to the transport and hands a bounded
/// inbound channel to the caller (document/session dispatch).
pub struct ChannelManager {
    state: ChannelState,
    config: ChannelConfig,
    transport: Option<Box<dyn Transport>>,
}

impl ChannelManager {
    pub fn new(config: ChannelConfig) -> Self {
        Self { state: ChannelState::Initialized, config, transport: None }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// §4.8 outgoing send: guards against send-before-initialized. Callers
    /// (the retry pipeline, component G) treat the resulting error as
    /// retryable.
    pub async fn send(&mut self, message: &AgentMessage) -> Result<(), CodedError> {
        if self.state != ChannelState::Ready {
            return Err(CodedError::new(ErrorCode::NotInitialized, "control channel is not initialized"));
        }
        let bytes = message
            .encode()
            .map_err(|e| CodedError::new(ErrorCode::FrameMalformed, format!("encode outgoing frame: {e}")))?;
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| CodedError::new(ErrorCode::NotInitialized, "control channel is not initialized"))?;
        transport.send(bytes).await
    }

    /// Fetches a token, opens the transport, sends the bootstrap frame, and
    /// waits for `control_channel_ready` within `ready_timeout`. Leaves the
    /// manager in `Ready` on success, `Closed` otherwise.
    pub async fn open(
        &mut self,
        token_provider: &dyn TokenProvider,
        dialer: &dyn Dialer,
        inbound: &mpsc::Sender<AgentMessage>,
        created_date: u64,
    ) -> Result<(), CodedError> {
        self.state = ChannelState::Opening;
        let token = token_provider.fetch_token().await?;
        self.open_with_token(&token, dialer, inbound, created_date).await
    }

    async fn open_with_token(
        &mut self,
        token: &ChannelToken,
        dialer: &dyn Dialer,
        inbound: &mpsc::Sender<AgentMessage>,
        created_date: u64,
    ) -> Result<(), CodedError> {
        let mut transport = dialer.dial(&token.websocket_url).await?;

        let bootstrap = AgentMessage::new(
            MessageType::AGENT_JOB_ACK,
            1,
            created_date,
            0,
            ssm_wire::FLAG_SYN,
            uuid::Uuid::new_v4(),
            PayloadType::HandshakeRequest.as_u32(),
            Bytes::from(token.token.clone().into_bytes()),
        );
        let encoded = bootstrap
            .encode()
            .map_err(|e| CodedError::new(ErrorCode::FrameMalformed, format!("encode bootstrap frame: {e}")))?;
        transport.send(encoded).await?;

        self.state = ChannelState::AwaitingReady;
        let ready = timeout(self.config.ready_timeout, wait_for_ready(&mut *transport, inbound)).await;

        match ready {
            Ok(Ok(())) => {
                self.transport = Some(transport);
                self.state = ChannelState::Ready;
                Ok(())
            }
            Ok(Err(err)) => {
                self.state = ChannelState::Closed;
                Err(err)
            }
            Err(_) => {
                self.state = ChannelState::Closed;
                Err(CodedError::new(ErrorCode::ReadyTimeout, "control_channel_ready not received within deadline"))
            }
        }
    }

    /// Runs the reconnect loop (§4.8): on any transport error, refetch a
    /// token and reopen with exponential backoff plus jitter, an up-front
    /// jitter on the very first attempt to avoid a thundering herd across a
    /// mass reconnect event. Once open, pumps inbound frames until the
    /// transport errors or closes, then reconnects. Returns the final
    /// [`HealthSignal`] once `cancel` fires or `max_attempts` is exhausted.
    pub async fn run(
        &mut self,
        token_provider: &dyn TokenProvider,
        dialer: &dyn Dialer,
        inbound: mpsc::Sender<AgentMessage>,
        cancel: &CancelFlag,
        now: impl Fn() -> u64,
    ) -> HealthSignal {
        let mut delay = jittered(self.config.initial_delay, self.config.jitter_ratio);

        for attempt in 0..self.config.max_attempts {
            if !cancel.is_running() {
                self.state = ChannelState::Closed;
                return HealthSignal::MgsSuccess;
            }

            match self.open(token_provider, dialer, &inbound, now()).await {
                Ok(()) => {
                    delay = jittered(self.config.initial_delay, self.config.jitter_ratio);
                    tokio::select! {
                        _ = self.pump(&inbound) => {}
                        _ = cancel.wait() => {
                            self.state = ChannelState::Closed;
                            return HealthSignal::MgsSuccess;
                        }
                    }
                    if !cancel.is_running() {
                        self.state = ChannelState::Closed;
                        return HealthSignal::MgsSuccess;
                    }
                    self.state = ChannelState::Reconnecting;
                    debug!("control channel pump ended, reconnecting");
                }
                Err(err) => {
                    self.state = ChannelState::Reconnecting;
                    warn!(attempt, code = %err.code, "control channel reconnect attempt failed");
                    if err.code == ErrorCode::AccessDenied {
                        return HealthSignal::MgsFailedDueToAccessDenied;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.wait() => {
                            self.state = ChannelState::Closed;
                            return HealthSignal::MgsSuccess;
                        }
                    }
                    delay = next_delay(delay, self.config.max_delay);
                }
            }
        }

        self.state = ChannelState::Closed;
        HealthSignal::MgsFailed
    }

    /// Reads frames off the live transport and forwards them to `inbound`
    /// until the transport closes or errors (§5 "control channel owns its own
    /// read loop"). `control_channel_ready` frames arriving here (a
    /// reconnect's late duplicate) are forwarded like any other frame; only
    /// the handshake's own wait treats that message type specially.
    async fn pump(&mut self, inbound: &mpsc::Sender<AgentMessage>) {
        let Some(transport) = self.transport.as_mut() else { return };
        loop {
            match transport.recv().await {
                Some(Ok(bytes)) => match AgentMessage::decode(bytes) {
                    Ok(message) => {
                        if inbound.send(message).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "discarding malformed frame"),
                },
                Some(Err(err)) => {
                    warn!(code = %err.code, "control channel transport error");
                    return;
                }
                None => {
                    debug!("control channel transport closed");
                    return;
                }
            }
        }
    }
}

async fn wait_for_ready(
    transport: &mut dyn Transport,
    inbound: &mpsc::Sender<AgentMessage>,
) -> Result<(), CodedError> {
    loop {
        match transport.recv().await {
            Some(Ok(bytes)) => {
                let message = AgentMessage::decode(bytes)
                    .map_err(|e| CodedError::new(ErrorCode::FrameMalformed, format!("decode frame: {e}")))?;
                if message.message_type == MessageType::CONTROL_CHANNEL_READY {
                    return Ok(());
                }
                debug!(message_type = %message.message_type, "frame received before channel ready, queuing");
                let _ = inbound.send(message).await;
            }
            Some(Err(err)) => return Err(err),
            None => {
                return Err(CodedError::new(ErrorCode::TransportSendFailed, "transport closed before ready"))
            }
        }
    }
}

fn next_delay(delay: Duration, max: Duration) -> Duration {
    (delay * 2).min(max)
}

fn jittered(base: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 {
        return base;
    }
    let jitter: f64 = rand::rng().random_range(0.0..ratio);
    base.mul_f64(1.0 + jitter)
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
