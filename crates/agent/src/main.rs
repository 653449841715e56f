// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ssmagent::config::Config;

/// Priority: `--log-level`/`SSMAGENT_LOG_LEVEL` > `RUST_LOG` > default
/// ("info"). `try_init` so repeated calls (e.g. from integration tests
/// driving the binary in-process) don't panic.
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = if std::env::var("RUST_LOG").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

#[tokio::main]
async fn main() {
    let config = Config::parse();
    init_tracing(&config);

    if let Err(e) = ssmagent::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
