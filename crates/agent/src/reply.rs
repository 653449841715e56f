// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Reply classifier & formatter (component F, §4.6): turns a
//! [`DocumentResult`] into one or more framed reply messages.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{CodedError, ErrorCode};
use crate::model::{DocumentResult, PluginResult, ResultType};
use crate::value::Value;
use ssm_wire::{AgentMessage, MessageType, PayloadType};

/// 120000 bytes (§4.6, §6): the cap on a serialized job-reply body.
pub const REPLY_SIZE_CAP: usize = 120_000;

/// Whether a document was submitted to run a command or to close out an
/// interactive session — drives both topic selection and which reply type
/// is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    SendCommand,
    CancelCommand,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendCommand => "aws.ssm.sendCommand",
            Self::CancelCommand => "aws.ssm.cancelCommand",
        }
    }
}

/// §4.6a. `SessionResult` always maps to `agent_task_complete`, so it has no
/// `Topic` variant of its own — callers building a `SessionCompleteReply`
/// don't need to pick one.
pub fn select_topic(result_type: &ResultType, is_cancel: bool) -> Option<Topic> {
    match result_type {
        ResultType::RunCommandResult if is_cancel => Some(Topic::CancelCommand),
        ResultType::RunCommandResult => Some(Topic::SendCommand),
        ResultType::SessionResult => None,
    }
}

/// The capability set every reply type exposes (§4.6, §9).
pub trait Reply {
    fn name(&self) -> &'static str;
    fn message_uuid(&self) -> Uuid;
    fn retry_number(&self) -> u32;
    fn number_of_continuous_retries(&self) -> u32;
    fn should_persist_data(&self) -> bool;
    fn back_off_seconds(&self) -> u64;
    fn increment_retries(&mut self);
    fn get_result(&self) -> &DocumentResult;
    fn convert_to_agent_message(&self) -> Result<AgentMessage, CodedError>;
}

#[derive(Serialize)]
struct SendReplyPayload<'a> {
    #[serde(rename = "additionalInfo")]
    additional_info: serde_json::Value,
    #[serde(rename = "documentStatus")]
    document_status: &'a str,
    #[serde(rename = "runtimeStatus")]
    runtime_status: serde_json::Value,
}

#[derive(Serialize)]
struct AgentJobReplyContent<'a> {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
    #[serde(rename = "jobId")]
    job_id: &'a str,
    content: String,
    topic: &'a str,
}

pub struct RunCommandReply {
    pub message_id: String,
    pub result: DocumentResult,
    pub is_cancel: bool,
    pub created_date: u64,
    pub schema_version: u32,
    retries: u32,
}

impl RunCommandReply {
    pub fn new(message_id: impl Into<String>, result: DocumentResult, is_cancel: bool, created_date: u64) -> Self {
        Self { message_id: message_id.into(), result, is_cancel, created_date, schema_version: 1, retries: 0 }
    }

    fn topic(&self) -> Topic {
        select_topic(&self.result.result_type, self.is_cancel).unwrap_or(Topic::SendCommand)
    }
}

impl Reply for RunCommandReply {
    fn name(&self) -> &'static str {
        "RunCommandReply"
    }

    fn message_uuid(&self) -> Uuid {
        Uuid::parse_str(&self.message_id).unwrap_or(Uuid::nil())
    }

    fn retry_number(&self) -> u32 {
        self.retries
    }

    fn number_of_continuous_retries(&self) -> u32 {
        1
    }

    fn should_persist_data(&self) -> bool {
        true
    }

    fn back_off_seconds(&self) -> u64 {
        1
    }

    fn increment_retries(&mut self) {
        self.retries += 1;
    }

    fn get_result(&self) -> &DocumentResult {
        &self.result
    }

    fn convert_to_agent_message(&self) -> Result<AgentMessage, CodedError> {
        let runtime_status: serde_json::Value = self
            .result
            .plugin_results
            .iter()
            .map(|(id, result)| (id.clone(), plugin_result_to_json(result)))
            .collect::<serde_json::Map<_, _>>()
            .into();

        let payload = SendReplyPayload {
            additional_info: serde_json::Value::Null,
            document_status: document_status_str(&self.result),
            runtime_status,
        };
        let payload_text = serde_json::to_string(&payload)
            .map_err(|e| CodedError::new(ErrorCode::ReplyTooLarge, format!("encode send-reply payload: {e}")))?;

        let body = AgentJobReplyContent {
            schema_version: self.schema_version,
            job_id: &self.message_id,
            content: payload_text,
            topic: self.topic().as_str(),
        };
        let body_text = serde_json::to_string(&body)
            .map_err(|e| CodedError::new(ErrorCode::ReplyTooLarge, format!("encode job reply: {e}")))?;

        if body_text.len() > REPLY_SIZE_CAP {
            return Err(CodedError::new(
                ErrorCode::ReplyTooLarge,
                format!("reply {} is {} bytes, exceeding the {REPLY_SIZE_CAP}-byte cap", self.message_id, body_text.len()),
            ));
        }

        Ok(AgentMessage::new(
            MessageType::AGENT_JOB_REPLY,
            self.schema_version,
            self.created_date,
            0,
            0,
            self.message_uuid(),
            PayloadType::Output.as_u32(),
            bytes::Bytes::from(body_text.into_bytes()),
        ))
    }
}

pub struct SessionCompleteReply {
    pub message_id: String,
    pub result: DocumentResult,
    pub instance_id: String,
    pub created_date: u64,
    pub schema_version: u32,
    retries: u32,
}

#[derive(Serialize)]
struct SessionPluginResultOutput {
    output: serde_json::Value,
    #[serde(rename = "s3Bucket")]
    s3_bucket: Option<String>,
    #[serde(rename = "s3UrlSuffix")]
    s3_url_suffix: Option<String>,
    #[serde(rename = "cwlGroup")]
    cwl_group: Option<String>,
    #[serde(rename = "cwlStream")]
    cwl_stream: Option<String>,
}

#[derive(Serialize)]
struct TaskCompletePayload<'a> {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
    #[serde(rename = "taskId")]
    task_id: &'a str,
    topic: &'a str,
    #[serde(rename = "finalTaskStatus")]
    final_task_status: &'a str,
    #[serde(rename = "instanceId")]
    instance_id: &'a str,
    output: serde_json::Value,
    #[serde(rename = "retryNumber")]
    retry_number: u32,
}

impl SessionCompleteReply {
    pub fn new(message_id: impl Into<String>, result: DocumentResult, instance_id: impl Into<String>, created_date: u64) -> Self {
        Self {
            message_id: message_id.into(),
            result,
            instance_id: instance_id.into(),
            created_date,
            schema_version: 1,
            retries: 0,
        }
    }

    /// Picks the `PluginResult` to surface (§4.6): `lastPlugin` when set,
    /// else any available entry — the map's iteration order isn't
    /// meaningful, so a reconnecting session with no explicit last plugin
    /// just needs *a* result, not a specific one.
    fn chosen_result(&self) -> Option<&PluginResult> {
        if !self.result.last_plugin.is_empty() {
            if let Some(r) = self.result.plugin_results.get(&self.result.last_plugin) {
                return Some(r);
            }
        }
        self.result.plugin_results.values().next()
    }
}

impl Reply for SessionCompleteReply {
    fn name(&self) -> &'static str {
        "SessionCompleteReply"
    }

    fn message_uuid(&self) -> Uuid {
        Uuid::parse_str(&self.message_id).unwrap_or(Uuid::nil())
    }

    fn retry_number(&self) -> u32 {
        self.retries
    }

    fn number_of_continuous_retries(&self) -> u32 {
        3
    }

    fn should_persist_data(&self) -> bool {
        false
    }

    fn back_off_seconds(&self) -> u64 {
        1
    }

    fn increment_retries(&mut self) {
        self.retries += 1;
    }

    fn get_result(&self) -> &DocumentResult {
        &self.result
    }

    fn convert_to_agent_message(&self) -> Result<AgentMessage, CodedError> {
        let chosen = self.chosen_result();

        let output = match chosen {
            Some(result) if !result.error.is_empty() => serde_json::Value::String(result.error.clone()),
            Some(result) => match session_plugin_result_output(&result.output) {
                Some(structured) => serde_json::to_value(&structured).unwrap_or(serde_json::Value::Null),
                None => result.output.to_json(),
            },
            None => serde_json::Value::Null,
        };

        let body = TaskCompletePayload {
            schema_version: self.schema_version,
            task_id: &self.message_id,
            topic: "agent_task_complete",
            final_task_status: document_status_str(&self.result),
            instance_id: &self.instance_id,
            output,
            retry_number: self.retries,
        };
        let body_text = serde_json::to_string(&body)
            .map_err(|e| CodedError::new(ErrorCode::ReplyTooLarge, format!("encode task-complete payload: {e}")))?;

        Ok(AgentMessage::new(
            MessageType::AGENT_TASK_COMPLETE,
            self.schema_version,
            self.created_date,
            0,
            0,
            self.message_uuid(),
            PayloadType::Output.as_u32(),
            bytes::Bytes::from(body_text.into_bytes()),
        ))
    }
}

/// If `output` round-trips as `{output, s3Bucket, s3UrlSuffix, cwlGroup,
/// cwlStream}` (§4.6), surface those fields; otherwise the caller falls
/// back to stringifying the raw value.
fn session_plugin_result_output(output: &Value) -> Option<SessionPluginResultOutput> {
    let Value::Map(map) = output else { return None };
    if !map.contains_key("output") {
        return None;
    }
    let get_str = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
    Some(SessionPluginResultOutput {
        output: map.get("output").map(Value::to_json).unwrap_or(serde_json::Value::Null),
        s3_bucket: get_str("s3Bucket"),
        s3_url_suffix: get_str("s3UrlSuffix"),
        cwl_group: get_str("cwlGroup"),
        cwl_stream: get_str("cwlStream"),
    })
}

fn plugin_result_to_json(result: &PluginResult) -> serde_json::Value {
    serde_json::json!({
        "status": format!("{:?}", result.status),
        "code": result.code,
        "error": result.error,
        "output": result.output.to_json(),
        "standardOutput": result.standard_output,
        "standardError": result.standard_error,
        "stepName": result.step_name,
    })
}

fn document_status_str(result: &DocumentResult) -> &'static str {
    match result.status {
        crate::model::PluginStatus::Success | crate::model::PluginStatus::SuccessAndReboot => "Success",
        crate::model::PluginStatus::Failed => "Failed",
        crate::model::PluginStatus::Skipped => "Skipped",
        crate::model::PluginStatus::InProgress => "InProgress",
        crate::model::PluginStatus::NotStarted => "Pending",
    }
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
