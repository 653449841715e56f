// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Process configuration (§6 "environment/config knobs", ambient-stack
//! expansion): a `clap::Parser` struct with `env` fallbacks for every knob,
//! matching the teacher's own `Config` shape (one flat struct, `--flag`/env
//! pair per setting, `default_value` for anything with a sane default).

use std::time::Duration;

use clap::Parser;

/// Core runtime of a remote-instance agent.
#[derive(Debug, Parser)]
#[command(name = "ssmagent", version, about)]
pub struct Config {
    /// Identifier of this instance, sent when fetching a channel token.
    #[arg(long, env = "SSMAGENT_INSTANCE_ID")]
    pub instance_id: String,

    /// HTTP endpoint used to fetch a control channel token.
    #[arg(long, env = "SSMAGENT_TOKEN_ENDPOINT")]
    pub token_endpoint: String,

    /// Platform type reported to the capability oracle (§4.3).
    #[arg(long, env = "SSMAGENT_PLATFORM_TYPE", default_value = "linux")]
    pub platform_type: String,

    /// Path to the durable reply persistence queue (§4.7).
    #[arg(long, env = "SSMAGENT_PERSIST_PATH", default_value = "ssmagent-replies.json")]
    pub persist_path: std::path::PathBuf,

    /// Initial retry delay in milliseconds, both for reply sends (§4.7) and
    /// control channel reconnects (§4.8).
    #[arg(long, env = "SSMAGENT_RETRY_INITIAL_DELAY_MS", default_value = "500")]
    pub retry_initial_delay_ms: u64,

    /// Maximum backoff delay in milliseconds.
    #[arg(long, env = "SSMAGENT_RETRY_MAX_DELAY_MS", default_value = "60000")]
    pub retry_max_delay_ms: u64,

    /// Maximum control channel reconnect attempts before reporting
    /// `MgsFailed` (§4.8).
    #[arg(long, env = "SSMAGENT_MAX_RECONNECT_ATTEMPTS", default_value = "10")]
    pub max_reconnect_attempts: u32,

    /// Control channel ready-handshake timeout in seconds.
    #[arg(long, env = "SSMAGENT_READY_TIMEOUT_SECS", default_value = "10")]
    pub ready_timeout_secs: u64,

    /// Reconnect backoff jitter ratio, e.g. `0.2` for up to 20% jitter.
    #[arg(long, env = "SSMAGENT_RECONNECT_JITTER_RATIO", default_value = "0.2")]
    pub reconnect_jitter_ratio: f64,

    /// Maximum serialized reply size in bytes before it is dropped (§4.6,
    /// §8: "reply > 120000 bytes").
    #[arg(long, env = "SSMAGENT_REPLY_SIZE_CAP", default_value = "120000")]
    pub reply_size_cap: usize,

    /// Per-step stdout/stderr truncation cap in bytes (§4.4).
    #[arg(long, env = "SSMAGENT_OUTPUT_TRUNCATE_CAP", default_value = "2500")]
    pub output_truncate_cap: usize,

    /// Suffix prepended to truncated step output.
    #[arg(long, env = "SSMAGENT_OUTPUT_TRUNCATE_SUFFIX", default_value = "---Output truncated---\n")]
    pub output_truncate_suffix: String,

    /// Session transcript ring buffer capacity in bytes (§4.9).
    #[arg(long, env = "SSMAGENT_SESSION_RING_SIZE", default_value = "1048576")]
    pub session_ring_size: usize,

    /// Log format (json or text).
    #[arg(long, env = "SSMAGENT_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "SSMAGENT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn channel_config(&self) -> crate::channel::ChannelConfig {
        crate::channel::ChannelConfig {
            initial_delay: self.retry_initial_delay(),
            max_delay: self.retry_max_delay(),
            max_attempts: self.max_reconnect_attempts,
            ready_timeout: self.ready_timeout(),
            jitter_ratio: self.reconnect_jitter_ratio,
        }
    }

    pub fn runner_config(&self) -> crate::runner::RunnerConfig {
        crate::runner::RunnerConfig {
            platform_type: self.platform_type.clone(),
            output_truncate_cap: self.output_truncate_cap,
            output_truncate_suffix: self.output_truncate_suffix.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
