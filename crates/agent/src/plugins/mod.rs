// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Concrete plugins (§4.3 expansion). Plugin business logic is a Non-goal
//! per spec §1, so only enough ships to exercise the registry/runner
//! contract end-to-end: a real `aws:runScript`-shaped plugin plus two
//! test-only plugins the runner's own suite uses to exercise reboot and
//! panic handling without a real platform-specific backend.

use std::process::Stdio;

use async_trait::async_trait;

use crate::cancel::CancelFlag;
use crate::registry::{Plugin, PluginContext, PluginOutcome};
use crate::value::Value;

/// Runs `runCommand: Vec<String>` as a child shell process, the same
/// "spawn a child, stream its stdout/stderr" shape the pty backend uses for
/// interactive sessions (§4.9), just without the pty.
#[derive(Debug, Default)]
pub struct RunScriptPlugin;

impl RunScriptPlugin {
    pub fn new() -> Self {
        Self
    }
}

fn extract_commands(properties: &Value) -> Result<Vec<String>, String> {
    let Value::Map(map) = properties else {
        return Err("runScript properties must be a map".to_string());
    };
    let Some(Value::List(items)) = map.get("runCommand") else {
        return Err("runScript properties missing a \"runCommand\" list".to_string());
    };
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| "runCommand entries must be strings".to_string()))
        .collect()
}

#[async_trait]
impl Plugin for RunScriptPlugin {
    async fn execute(&mut self, _ctx: &PluginContext, properties: &Value, cancel: &CancelFlag) -> PluginOutcome {
        let commands = match extract_commands(properties) {
            Ok(commands) if !commands.is_empty() => commands,
            Ok(_) => return PluginOutcome::failure(1, "runCommand must contain at least one command"),
            Err(message) => return PluginOutcome::failure(1, message),
        };
        let script = commands.join("\n");

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return PluginOutcome::failure(1, format!("failed to spawn runScript: {e}")),
        };

        tokio::select! {
            result = child.wait_with_output() => match result {
                Ok(output) => {
                    let code = output.status.code().unwrap_or(-1);
                    let standard_output = String::from_utf8_lossy(&output.stdout).into_owned();
                    let standard_error = String::from_utf8_lossy(&output.stderr).into_owned();
                    if output.status.success() {
                        PluginOutcome { success: true, code, standard_output, standard_error, ..Default::default() }
                    } else {
                        PluginOutcome {
                            success: false,
                            code,
                            error: format!("runScript exited with code {code}"),
                            standard_output,
                            standard_error,
                            ..Default::default()
                        }
                    }
                }
                Err(e) => PluginOutcome::failure(1, format!("runScript wait failed: {e}")),
            },
            // Dropping `child` here kills the process (`kill_on_drop`).
            _ = cancel.wait() => PluginOutcome::failure(1, "runScript canceled"),
        }
    }
}

/// Test-only plugin that always reports success-and-reboot, exercising the
/// runner's reboot handling without a real platform-specific backend.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct AlwaysRebootPlugin;

#[cfg(test)]
#[async_trait]
impl Plugin for AlwaysRebootPlugin {
    async fn execute(&mut self, _ctx: &PluginContext, _properties: &Value, _cancel: &CancelFlag) -> PluginOutcome {
        PluginOutcome { success: true, reboot: true, ..Default::default() }
    }
}

/// Test-only plugin that always panics, exercising the runner's panic
/// isolation (§4.4, §7: "plugin panic — caught; step marked Failed").
#[cfg(test)]
#[derive(Debug, Default)]
pub struct AlwaysPanicPlugin;

#[cfg(test)]
#[async_trait]
impl Plugin for AlwaysPanicPlugin {
    async fn execute(&mut self, _ctx: &PluginContext, _properties: &Value, _cancel: &CancelFlag) -> PluginOutcome {
        panic!("AlwaysPanicPlugin always panics");
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
