// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Retry & persistence pipeline (component G, §4.7): wraps an outgoing
//! [`crate::reply::Reply`] with exponential-backoff-with-jitter retries,
//! falling back to the durable queue on exhaustion.

use std::time::Duration;

use rand::Rng;

use crate::error::{CodedError, ErrorCode};
use crate::reply::Reply;

/// Geometric ratio applied to the delay after every failed attempt.
const BACKOFF_RATIO: f64 = 2.0;
/// Upper bound on any single sleep, regardless of how many attempts have
/// elapsed (mirrors the teacher's token-refresh backoff cap).
const MAX_DELAY: Duration = Duration::from_secs(60);

/// A single attempt to hand a framed message to the transport. Kept as a
/// trait rather than a bare closure so retry tests can script failure
/// sequences without a real channel manager.
#[async_trait::async_trait]
pub trait Sender {
    async fn send(&self, message: &ssm_wire::AgentMessage) -> Result<(), CodedError>;
}

/// Drive `reply` to completion against `sender`: build the frame once, then
/// retry sending it up to `reply.number_of_continuous_retries()` times with
/// exponential backoff plus jitter, honoring `reply.back_off_seconds()` as
/// the initial delay. `non_retryable` short-circuits the loop the first time
/// a failure's code appears in it (§4.7).
pub async fn send_with_retry(
    reply: &mut dyn Reply,
    sender: &dyn Sender,
    non_retryable: &[ErrorCode],
) -> RetryOutcome {
    let message = match reply.convert_to_agent_message() {
        Ok(m) => m,
        Err(err) => return RetryOutcome::BuildFailed(err),
    };

    let mut delay = Duration::from_secs(reply.back_off_seconds().max(1));
    let attempts = reply.number_of_continuous_retries().max(1);

    for attempt in 0..attempts {
        match sender.send(&message).await {
            Ok(()) => return RetryOutcome::Sent,
            Err(err) => {
                if non_retryable.contains(&err.code) {
                    return RetryOutcome::GaveUp { last_error: err, persisted: false, framed_bytes: message.encode().ok() };
                }
                if attempt + 1 == attempts {
                    let persisted = reply.should_persist_data();
                    let framed_bytes = message.encode().ok();
                    return RetryOutcome::GaveUp { last_error: err, persisted, framed_bytes };
                }
                reply.increment_retries();
                tokio::time::sleep(jittered(delay)).await;
                delay = next_delay(delay);
            }
        }
    }

    // `attempts` is clamped to at least 1 above, so the loop always returns
    // from one of its branches; this is unreachable in practice.
    RetryOutcome::GaveUp {
        last_error: CodedError::new(ErrorCode::TransportSendFailed, "retry loop exhausted with no attempts"),
        persisted: false,
        framed_bytes: None,
    }
}

fn next_delay(delay: Duration) -> Duration {
    Duration::from_secs_f64((delay.as_secs_f64() * BACKOFF_RATIO).min(MAX_DELAY.as_secs_f64()))
}

/// Adds up to 20% uniform jitter on top of `delay`, avoiding a thundering
/// herd of agents that all failed at the same instant reconnecting in lockstep.
fn jittered(delay: Duration) -> Duration {
    let jitter_ratio: f64 = rand::rng().random_range(0.0..0.2);
    delay.mul_f64(1.0 + jitter_ratio)
}

#[derive(Debug)]
pub enum RetryOutcome {
    Sent,
    /// Every retry was exhausted (or a non-retryable error hit); `persisted`
    /// says whether the caller already wrote the reply to the durable queue.
    /// `framed_bytes` carries the already-encoded frame so the caller can
    /// persist something redeliverable instead of re-rendering it; `None`
    /// only if the frame that was actually sent somehow fails to re-encode.
    GaveUp { last_error: CodedError, persisted: bool, framed_bytes: Option<bytes::Bytes> },
    /// The reply itself couldn't be serialized into a frame; never retried,
    /// since no amount of resending fixes a malformed payload.
    BuildFailed(CodedError),
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
