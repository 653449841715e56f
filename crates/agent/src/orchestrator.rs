// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Top-level wiring: control channel (H) -> document dispatch (D, via
//! `document`/`runner`) -> reply classification and delivery (F/G) -> session
//! routing (I). Grounded on the teacher's `lib::run` (build state, spawn
//! background tasks, drive until shutdown), adapted from an inbound-HTTP
//! server to an outbound control-channel client.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::cancel::{CancelFlag, ShutdownSource};
use crate::channel::{ChannelManager, HealthSignal, WsDialer};
use crate::config::Config;
use crate::document;
use crate::model::{DocumentResult, ResultType};
use crate::persist::{self, PersistedReply};
use crate::plugins::RunScriptPlugin;
use crate::registry::{CapabilityOracle, Registry};
use crate::reply::{RunCommandReply, SessionCompleteReply};
use crate::retry::{self, RetryOutcome, Sender};
use crate::runner;
use crate::token::HttpTokenProvider;
use ssm_wire::{AgentMessage, MessageType};

/// Builds the plugin set this agent ships (§4.3 expansion): a real
/// `aws:runScript` handler plus the Linux/Windows shell aliases the
/// capability oracle recognizes. No platform-specific business logic beyond
/// that ships, per the Non-goals.
pub fn build_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register("aws:runScript", Arc::new(|_ctx| Ok(Box::new(RunScriptPlugin::new()) as Box<_>)));
    registry.register("aws:runShellScript", Arc::new(|_ctx| Ok(Box::new(RunScriptPlugin::new()) as Box<_>)));
    registry
}

pub fn build_oracle() -> CapabilityOracle {
    let mut oracle = CapabilityOracle::new();
    oracle.declare("aws:runScript", None);
    oracle.declare("aws:runShellScript", Some(vec!["linux".to_string(), "macos".to_string()]));
    oracle.declare("aws:runPowerShellScript", Some(vec!["windows".to_string()]));
    oracle
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Adapts the shared [`ChannelManager`] to [`retry::Sender`] so the retry
/// pipeline (G) doesn't need to know about channel state transitions.
struct ChannelSender {
    manager: Arc<Mutex<ChannelManager>>,
}

#[async_trait::async_trait]
impl Sender for ChannelSender {
    async fn send(&self, message: &AgentMessage) -> Result<(), crate::error::CodedError> {
        self.manager.lock().await.send(message).await
    }
}

/// §4.6/§4.7: derives the outcome to reply with and which [`Reply`] type to
/// build. A document is treated as session-scoped when any of its steps
/// carries a `sessionId` (§3) — the only signal this model has for "this job
/// closes out an interactive session" versus "this job ran a command".
fn build_document_result(message_id: String, plugins_run: &runner_output::Aggregate) -> DocumentResult {
    let result_type = if plugins_run.is_session { ResultType::SessionResult } else { ResultType::RunCommandResult };
    let status = plugins_run.overall_status();
    DocumentResult {
        message_id,
        result_type,
        related_document_type: "Command".to_string(),
        last_plugin: plugins_run.last_plugin.clone(),
        plugin_results: plugins_run.results.clone(),
        status,
    }
}

mod runner_output {
    use std::collections::BTreeMap;

    use crate::model::{PluginResult, PluginStatus};

    pub struct Aggregate {
        pub results: BTreeMap<String, PluginResult>,
        pub last_plugin: String,
        pub is_session: bool,
    }

    impl Aggregate {
        /// §4.6/§4.4: a document is `Failed` if any step failed, else
        /// `Success` (skipped-only steps still count as an overall success,
        /// mirroring the runner's own per-step `Skipped` semantics).
        pub fn overall_status(&self) -> PluginStatus {
            if self.results.values().any(|r| r.status == PluginStatus::Failed) {
                PluginStatus::Failed
            } else {
                PluginStatus::Success
            }
        }
    }
}

async fn dispatch_job(
    payload: &[u8],
    message_id: String,
    is_cancel: bool,
    registry: &Registry,
    oracle: &CapabilityOracle,
    runner_config: &runner::RunnerConfig,
    cancel: &CancelFlag,
    sender: &dyn Sender,
    instance_id: &str,
    persist_path: &std::path::Path,
) {
    let text = String::from_utf8_lossy(payload);
    let mut document = match document::parse_document(&text) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(%message_id, error = %err, "dropping malformed document");
            return;
        }
    };

    let is_session = document.plugins.iter().any(|p| p.configuration.session_id.is_some());
    let (result_tx, mut result_rx) = mpsc::channel(document.plugins.len().max(1));
    let document_task = runner::run(&mut document, registry, oracle, runner_config, result_tx, cancel);

    tokio::pin!(document_task);
    let mut last_plugin = String::new();
    loop {
        tokio::select! {
            results = &mut document_task => {
                let aggregate = runner_output::Aggregate { results, last_plugin: last_plugin.clone(), is_session };
                send_document_result(aggregate, message_id, is_cancel, sender, instance_id, persist_path).await;
                return;
            }
            Some(result) = result_rx.recv() => {
                last_plugin = result.plugin_id.clone();
                debug!(plugin_id = %result.plugin_id, status = ?result.status, "step result");
            }
        }
    }
}

async fn send_document_result(
    aggregate: runner_output::Aggregate,
    message_id: String,
    is_cancel: bool,
    sender: &dyn Sender,
    instance_id: &str,
    persist_path: &std::path::Path,
) {
    let is_session = aggregate.is_session;
    let created_date = now_millis();
    let doc_result = build_document_result(message_id.clone(), &aggregate);

    let non_retryable = [crate::error::ErrorCode::ReplyTooLarge];
    let outcome = if is_session {
        let mut reply = SessionCompleteReply::new(message_id.clone(), doc_result, instance_id, created_date);
        let message_type = MessageType::AGENT_TASK_COMPLETE;
        let outcome = retry::send_with_retry(&mut reply, sender, &non_retryable).await;
        (outcome, message_type)
    } else {
        let mut reply = RunCommandReply::new(message_id.clone(), doc_result, is_cancel, created_date);
        let message_type = MessageType::AGENT_JOB_REPLY;
        let outcome = retry::send_with_retry(&mut reply, sender, &non_retryable).await;
        (outcome, message_type)
    };

    match outcome.0 {
        RetryOutcome::Sent => debug!(%message_id, "reply delivered"),
        RetryOutcome::BuildFailed(err) => error!(%message_id, error = %err, "reply could not be framed"),
        RetryOutcome::GaveUp { last_error, persisted, framed_bytes } => {
            warn!(%message_id, error = %last_error, persisted, "reply delivery exhausted retries");
            if persisted {
                match framed_bytes {
                    Some(bytes) => persist_reply(persist_path, &message_id, outcome.1, created_date, &bytes),
                    None => error!(%message_id, "reply exhausted retries but its frame could not be re-encoded; dropping"),
                }
            }
        }
    }
}

fn persist_reply(path: &std::path::Path, message_id: &str, message_type: &str, created_date: u64, framed_bytes: &[u8]) {
    let uuid = match uuid::Uuid::parse_str(message_id) {
        Ok(id) => id,
        Err(_) => return,
    };
    let mut queue = persist::load(path).unwrap_or_default();
    queue.insert(uuid, PersistedReply::new(message_type, created_date, framed_bytes, 0));
    if let Err(e) = persist::save(path, &queue) {
        error!(error = %e, "failed to persist undelivered reply");
    }
}

/// Runs the agent until the process receives a shutdown signal (ctrl-c) or
/// the control channel exhausts its reconnect budget.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let registry = build_registry();
    let oracle = build_oracle();
    let runner_config = config.runner_config();
    let channel_config = config.channel_config();

    let http_client = reqwest::Client::new();
    let token_provider = HttpTokenProvider::new(http_client, config.token_endpoint.clone(), config.instance_id.clone());
    let dialer = WsDialer;

    let shutdown = ShutdownSource::new();
    let document_cancel = shutdown.new_document_flag();

    let manager = Arc::new(Mutex::new(ChannelManager::new(channel_config)));
    let sender = ChannelSender { manager: Arc::clone(&manager) };

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<AgentMessage>(256);

    let channel_task = {
        let manager = Arc::clone(&manager);
        let shutdown_flag = shutdown.new_document_flag();
        tokio::spawn(async move {
            let signal = manager
                .lock()
                .await
                .run(&token_provider, &dialer, inbound_tx, &shutdown_flag, now_millis)
                .await;
            match signal {
                HealthSignal::MgsSuccess => info!("control channel closed"),
                HealthSignal::MgsFailed => error!("control channel exhausted reconnect attempts"),
                HealthSignal::MgsFailedDueToAccessDenied => error!("control channel access denied"),
            }
        })
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown requested");
                shutdown.shut_down();
                break;
            }
            message = inbound_rx.recv() => {
                match message {
                    Some(message) => handle_inbound(
                        message,
                        &registry,
                        &oracle,
                        &runner_config,
                        &document_cancel,
                        &sender,
                        &config,
                    ).await,
                    None => {
                        warn!("control channel inbound closed");
                        break;
                    }
                }
            }
        }
    }

    channel_task.abort();
    Ok(())
}

async fn handle_inbound(
    message: AgentMessage,
    registry: &Registry,
    oracle: &CapabilityOracle,
    runner_config: &runner::RunnerConfig,
    cancel: &CancelFlag,
    sender: &dyn Sender,
    config: &Config,
) {
    match message.message_type.as_str() {
        MessageType::AGENT_JOB => {
            let message_id = message.message_id.to_string();
            dispatch_job(
                &message.payload,
                message_id,
                false,
                registry,
                oracle,
                runner_config,
                cancel,
                sender,
                &config.instance_id,
                &config.persist_path,
            )
            .await;
        }
        other => {
            debug!(message_type = %other, "frame not routed to document dispatch (session routing owns it)");
        }
    }
}
