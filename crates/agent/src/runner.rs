// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! The document plugin runner (component D, §4.4): the sequential state
//! machine that steps through a [`Document`]'s plugins in order.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cancel::CancelFlag;
use crate::model::{
    Document, OnFailure, PluginResult, PluginState, PluginStatus, EXIT_WITH_FAILURE, EXIT_WITH_SUCCESS,
};
use crate::precondition;
use crate::registry::{CapabilityOracle, PluginContext, Registry};
use crate::value::Value;

pub struct RunnerConfig {
    pub platform_type: String,
    pub output_truncate_cap: usize,
    pub output_truncate_suffix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            platform_type: "linux".to_string(),
            output_truncate_cap: 2500,
            output_truncate_suffix: "---Output truncated---\n".to_string(),
        }
    }
}

enum Operation {
    Execute,
    Skip(String),
    Fail(String),
}

fn should_skip_due_to_prior(prior: &[PluginState]) -> bool {
    prior.iter().any(|p| {
        p.result.code == EXIT_WITH_SUCCESS
            || p.result.code == EXIT_WITH_FAILURE
            || (p.configuration.on_failure == Some(OnFailure::Exit) && p.result.status == PluginStatus::Failed)
            || (p.configuration.on_success == Some(crate::model::OnSuccess::Exit)
                && p.result.status == PluginStatus::Success)
    })
}

/// Resolves each precondition argument's `initial` text against `parameters`
/// the same way step properties are resolved (§4.1/§4.2): a literal arg that
/// names a known parameter becomes a `substituted` arg so `StringEquals` can
/// tell "the document supplied a value" from "nothing was substituted".
fn resolve_preconditions(
    preconditions: &BTreeMap<String, Vec<precondition::PreconditionArg>>,
    parameters: &BTreeMap<String, Value>,
) -> BTreeMap<String, Vec<precondition::PreconditionArg>> {
    preconditions
        .iter()
        .map(|(operator, args)| {
            let resolved = args
                .iter()
                .map(|arg| {
                    let substituted = crate::value::substitute(&Value::Str(arg.initial.clone()), parameters);
                    let resolved = crate::value::coerce_to_string(&substituted);
                    precondition::PreconditionArg::substituted(arg.initial.clone(), resolved)
                })
                .collect();
            (operator.clone(), resolved)
        })
        .collect()
}

fn select_operation(
    step: &PluginState,
    oracle: &CapabilityOracle,
    registry: &Registry,
    platform_type: &str,
    parameters: &BTreeMap<String, Value>,
    should_skip: bool,
) -> Operation {
    if should_skip {
        return Operation::Skip("skipped: an earlier step halted the document".to_string());
    }

    let is_known = oracle.is_known(&step.name);
    let is_supported = oracle.is_supported(&step.name, platform_type);
    let is_handler = registry.is_handler(&step.name);
    let has_preconditions = !step.configuration.preconditions.is_empty();

    if !step.configuration.is_precondition_enabled {
        if !is_known {
            return Operation::Fail(format!("plugin {:?} is not known; update the agent", step.name));
        }
        if !is_supported {
            return Operation::Fail(format!("plugin {:?} is not supported on this platform", step.name));
        }
        if has_preconditions {
            return Operation::Fail("preconditions require a document schema of 2.2 or later".to_string());
        }
        if !is_handler {
            return Operation::Fail(format!("plugin {:?} not found", step.name));
        }
        return Operation::Execute;
    }

    if !has_preconditions {
        if !is_known {
            return Operation::Fail(format!("plugin {:?} is not known; update the agent", step.name));
        }
        return if is_supported && is_handler {
            Operation::Execute
        } else {
            Operation::Skip(format!("plugin {:?} is incompatible platform or not installed", step.name))
        };
    }

    let resolved_preconditions = resolve_preconditions(&step.configuration.preconditions, parameters);
    let eval = precondition::evaluate(&resolved_preconditions, platform_type);
    if eval.allowed && !is_known {
        return Operation::Fail(format!("plugin {:?} is not known; update the agent", step.name));
    }
    if !is_supported || !is_handler {
        return Operation::Skip(format!("plugin {:?} incompatible platform", step.name));
    }
    if !eval.allowed {
        return Operation::Skip(format!(
            "incompatible platform or unmet precondition: {}",
            eval.unrecognized.join("; ")
        ));
    }
    if !eval.unrecognized.is_empty() {
        return Operation::Fail(format!("unrecognized precondition(s): {}", eval.unrecognized.join("; ")));
    }
    Operation::Execute
}

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn derive_step_name(step: &PluginState) -> String {
    if step.name == "aws:cloudWatch" {
        return "aws:cloudWatch".to_string();
    }
    if step.configuration.plugin_id == step.configuration.plugin_name {
        let mut last_id = None;
        for element in step.configuration.properties.as_elements() {
            if let Value::Map(map) = element {
                if let Some(Value::Str(id)) = map.get("id") {
                    last_id = Some(id.clone());
                }
            }
        }
        if let Some(id) = last_id {
            return id;
        }
    }
    step.configuration.plugin_id.clone()
}

fn truncate_output(s: &str, cap: usize, suffix: &str) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let mut start = s.len() - cap;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    format!("{suffix}{}", &s[start..])
}

fn exit_banner(code: i32) -> String {
    if code == EXIT_WITH_SUCCESS {
        format!("\nStep exited with code {code} and marked this step (and the document) successful.")
    } else {
        format!("\nStep exited with code {code} and marked this step (and the document) failed.")
    }
}

fn on_failure_banner() -> String {
    "\nStep failed and onFailure=exit halted the remaining steps.".to_string()
}

async fn invoke_plugin(
    plugin: &mut dyn crate::registry::Plugin,
    ctx: &PluginContext,
    elements: &[&Value],
    cancel: &CancelFlag,
) -> crate::registry::PluginOutcome {
    let mut merged = crate::registry::PluginOutcome { success: true, ..Default::default() };
    for element in elements {
        let outcome = guarded_execute(plugin, ctx, element, cancel).await;
        merged.standard_output.push_str(&outcome.standard_output);
        merged.standard_error.push_str(&outcome.standard_error);
        merged.output = outcome.output.clone();
        merged.success = outcome.success;
        merged.reboot = outcome.reboot;
        merged.code = outcome.code;
        merged.error = outcome.error.clone();
        if !outcome.success {
            break;
        }
    }
    merged
}

/// Any panic raised by plugin code is caught here and converted to a
/// structured failure (§4.4, §7) — plugins never take down the process.
async fn guarded_execute(
    plugin: &mut dyn crate::registry::Plugin,
    ctx: &PluginContext,
    properties: &Value,
    cancel: &CancelFlag,
) -> crate::registry::PluginOutcome {
    let future = AssertUnwindSafe(plugin.execute(ctx, properties, cancel)).catch_unwind();
    match future.await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(&payload);
            warn!(plugin = %ctx.plugin_name, %message, "plugin panicked");
            crate::registry::PluginOutcome::failure(1, format!("Plugin crashed with message {message}"))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Sends a truncated-for-the-channel copy; the full-text result stays in the
/// map this function's caller maintains.
fn send_result(tx: &mpsc::Sender<PluginResult>, result: &PluginResult, config: &RunnerConfig) {
    let mut copy = result.clone();
    copy.standard_output = truncate_output(&copy.standard_output, config.output_truncate_cap, &config.output_truncate_suffix);
    copy.standard_error = truncate_output(&copy.standard_error, config.output_truncate_cap, &config.output_truncate_suffix);
    let _ = tx.try_send(copy);
}

/// Runs every step of `document` in order, returning the full-text result
/// map. `result_tx` should be a channel buffered to `document.plugins.len()`
/// so every send succeeds without blocking (§4.4).
pub async fn run(
    document: &mut Document,
    registry: &Registry,
    oracle: &CapabilityOracle,
    config: &RunnerConfig,
    result_tx: mpsc::Sender<PluginResult>,
    cancel: &CancelFlag,
) -> BTreeMap<String, PluginResult> {
    let mut results = BTreeMap::new();
    let total = document.plugins.len();
    let parameters = document.parameters.clone();

    let mut index = 0;
    while index < total {
        // Entry-status handling (§4.4 table). Work on a clone of the prior
        // steps' state to compute admission before mutating this step.
        let prior_snapshot = document.plugins[..index].to_vec();
        let is_final = index == total - 1;

        let step = &mut document.plugins[index];
        match step.result.status {
            PluginStatus::NotStarted | PluginStatus::InProgress => {
                step.result.start_date_time = now_millis();
            }
            PluginStatus::SuccessAndReboot => {
                step.result.status = PluginStatus::InProgress;
                step.result.start_date_time = now_millis();
            }
            PluginStatus::Failed => {
                send_result(&result_tx, &step.result, config);
                results.insert(step.id.clone(), step.result.clone());
                index += 1;
                continue;
            }
            PluginStatus::Success | PluginStatus::Skipped => {
                index += 1;
                continue;
            }
        }

        let is_finally = is_final && step.configuration.finally;
        if !is_final && step.configuration.finally {
            warn!(plugin_id = %step.id, "finally is only honored on the last step; ignoring");
        }

        let should_skip = should_skip_due_to_prior(&prior_snapshot) && !is_finally;
        let operation = select_operation(step, oracle, registry, &config.platform_type, &parameters, should_skip);

        match operation {
            Operation::Skip(reason) => {
                debug!(plugin_id = %step.id, %reason, "skipping step");
                step.result.mark_skipped(reason);
                step.result.end_date_time = now_millis().max(step.result.start_date_time);
            }
            Operation::Fail(reason) => {
                warn!(plugin_id = %step.id, %reason, "failing step");
                step.result.status = PluginStatus::Failed;
                step.result.code = 1;
                step.result.error = reason;
                step.result.end_date_time = now_millis().max(step.result.start_date_time);
            }
            Operation::Execute => {
                step.result.step_name = derive_step_name(step);
                let ctx = PluginContext {
                    plugin_name: step.name.clone(),
                    step_name: step.result.step_name.clone(),
                    session_id: step.configuration.session_id.clone(),
                    run_as_user: step.configuration.run_as_user.clone(),
                    shell_profile: step.configuration.shell_profile.clone(),
                };
                let substituted = step.configuration.properties.substituted(&parameters);
                let elements = substituted.as_elements();
                match registry.create(&step.name, &ctx) {
                    Ok(mut plugin) => {
                        let outcome = invoke_plugin(plugin.as_mut(), &ctx, &elements, cancel).await;
                        apply_outcome(step, outcome);
                    }
                    Err(err) => {
                        step.result.status = PluginStatus::Failed;
                        step.result.code = 1;
                        step.result.error = err.message;
                    }
                }
                step.result.end_date_time = now_millis().max(step.result.start_date_time);
            }
        }

        let step = &document.plugins[index];
        send_result(&result_tx, &step.result, config);
        results.insert(step.id.clone(), step.result.clone());

        // A stop-further-steps condition (exit 168/169, onFailure=exit) isn't
        // an explicit loop break: the next iteration's `should_skip_due_to_prior`
        // reads this step's now-updated code/status/on_failure and marks every
        // later non-`finally` step Skipped on its own.
        let reboot = step.result.status == PluginStatus::SuccessAndReboot;

        index += 1;
        if reboot {
            debug!("document paused for SuccessAndReboot");
            break;
        }
    }

    results
}

fn apply_outcome(step: &mut PluginState, outcome: crate::registry::PluginOutcome) {
    let result = &mut step.result;
    result.standard_output.push_str(&outcome.standard_output);
    result.standard_error.push_str(&outcome.standard_error);
    result.output = outcome.output;
    result.code = outcome.code;
    result.error = outcome.error;
    result.status = if outcome.reboot {
        PluginStatus::SuccessAndReboot
    } else if outcome.success {
        PluginStatus::Success
    } else {
        PluginStatus::Failed
    };

    if result.code == EXIT_WITH_SUCCESS {
        result.status = PluginStatus::Success;
        result.error.clear();
        result.standard_output.push_str(&exit_banner(EXIT_WITH_SUCCESS));
    } else if result.code == EXIT_WITH_FAILURE {
        let banner = exit_banner(EXIT_WITH_FAILURE);
        result.standard_output.push_str(&banner);
        result.standard_error.push_str(&banner);
    }

    if result.status == PluginStatus::Failed {
        if let Some(on_failure) = step.configuration.on_failure {
            result.standard_output.push_str(&on_failure_banner());
            if on_failure == OnFailure::SuccessAndExit {
                result.status = PluginStatus::Success;
                result.code = EXIT_WITH_SUCCESS;
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
