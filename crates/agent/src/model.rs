// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! The document/plugin data model (§3): `Document`, `PluginState`,
//! `PluginResult`, `DocumentResult`.

use std::collections::BTreeMap;

use crate::value::Value;

/// Exit codes that short-circuit the remaining steps of a document (§6).
pub const EXIT_WITH_SUCCESS: i32 = 168;
pub const EXIT_WITH_FAILURE: i32 = 169;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Exit,
    SuccessAndExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnSuccess {
    Exit,
}

/// Recognized fields of `PluginState.configuration` (§3).
#[derive(Debug, Clone, Default)]
pub struct PluginConfiguration {
    pub plugin_id: String,
    pub plugin_name: String,
    /// A single properties object, or an ordered sequence of them — when a
    /// sequence, the runner invokes the plugin once per element (§4.4).
    pub properties: PropertiesShape,
    pub is_precondition_enabled: bool,
    pub preconditions: BTreeMap<String, Vec<crate::precondition::PreconditionArg>>,
    pub output_s3_bucket_name: Option<String>,
    pub output_s3_key_prefix: Option<String>,
    pub cloud_watch_log_group: Option<String>,
    pub session_id: Option<String>,
    pub run_as_user: Option<String>,
    pub shell_profile: Option<String>,
    pub on_failure: Option<OnFailure>,
    pub on_success: Option<OnSuccess>,
    pub finally: bool,
}

#[derive(Debug, Clone)]
pub enum PropertiesShape {
    Single(Value),
    Sequence(Vec<Value>),
}

impl Default for PropertiesShape {
    fn default() -> Self {
        Self::Single(Value::Null)
    }
}

impl PropertiesShape {
    pub fn as_elements(&self) -> Vec<&Value> {
        match self {
            Self::Single(v) => vec![v],
            Self::Sequence(items) => items.iter().collect(),
        }
    }

    pub fn substituted(&self, params: &BTreeMap<String, Value>) -> Self {
        match self {
            Self::Single(v) => Self::Single(crate::value::substitute(v, params)),
            Self::Sequence(items) => {
                Self::Sequence(items.iter().map(|v| crate::value::substitute(v, params)).collect())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PluginStatus {
    #[default]
    NotStarted,
    InProgress,
    Success,
    Failed,
    Skipped,
    SuccessAndReboot,
}

impl PluginStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped | Self::SuccessAndReboot)
    }
}

/// Per-step outcome (§3). `start_date_time`/`end_date_time` are milliseconds
/// since epoch, supplied by the caller (this module performs no clock reads
/// so it stays synchronously testable).
#[derive(Debug, Clone)]
pub struct PluginResult {
    pub plugin_id: String,
    pub plugin_name: String,
    pub status: PluginStatus,
    pub code: i32,
    pub error: String,
    pub output: Value,
    pub standard_output: String,
    pub standard_error: String,
    pub start_date_time: u64,
    pub end_date_time: u64,
    pub step_name: String,
    pub output_s3_bucket_name: Option<String>,
    pub output_s3_key_prefix: Option<String>,
}

impl PluginResult {
    pub fn new(plugin_id: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            plugin_name: plugin_name.into(),
            status: PluginStatus::NotStarted,
            code: 0,
            error: String::new(),
            output: Value::Null,
            standard_output: String::new(),
            standard_error: String::new(),
            start_date_time: 0,
            end_date_time: 0,
            step_name: String::new(),
            output_s3_bucket_name: None,
            output_s3_key_prefix: None,
        }
    }

    /// §3 invariant: a `Skipped` result always carries exit code 0.
    pub fn mark_skipped(&mut self, reason: impl Into<String>) {
        self.status = PluginStatus::Skipped;
        self.code = 0;
        self.error = reason.into();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultType {
    RunCommandResult,
    SessionResult,
}

#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub message_id: String,
    pub result_type: ResultType,
    pub related_document_type: String,
    pub last_plugin: String,
    pub plugin_results: BTreeMap<String, PluginResult>,
    pub status: PluginStatus,
}

/// One element of a `Document` (§3). `configuration` is intentionally not
/// `Copy`/`Clone`-cheap; the runner owns one `Document` per execution.
#[derive(Debug, Clone)]
pub struct PluginState {
    pub id: String,
    pub name: String,
    pub configuration: PluginConfiguration,
    pub result: PluginResult,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub plugins: Vec<PluginState>,
    /// Document-level parameters available for `{{ name }}` substitution
    /// into every step's `properties` (component A, §4.1).
    pub parameters: BTreeMap<String, Value>,
}
