use super::*;
use crate::model::{PluginResult, PluginStatus};
use std::collections::BTreeMap;

fn document_result(message_id: &str, result_type: ResultType, stuffing_bytes: usize) -> DocumentResult {
    let mut plugin_results = BTreeMap::new();
    let mut result = PluginResult::new("1", "aws:runScript");
    result.status = PluginStatus::Success;
    result.standard_output = "x".repeat(stuffing_bytes);
    plugin_results.insert("1".to_string(), result);

    DocumentResult {
        message_id: message_id.to_string(),
        result_type,
        related_document_type: "Command".to_string(),
        last_plugin: "1".to_string(),
        plugin_results,
        status: PluginStatus::Success,
    }
}

#[test]
fn run_command_result_selects_send_command_topic() {
    assert_eq!(select_topic(&ResultType::RunCommandResult, false), Some(Topic::SendCommand));
}

#[test]
fn run_command_result_cancel_selects_cancel_command_topic() {
    assert_eq!(select_topic(&ResultType::RunCommandResult, true), Some(Topic::CancelCommand));
}

#[test]
fn session_result_has_no_topic() {
    assert_eq!(select_topic(&ResultType::SessionResult, false), None);
}

#[test]
fn run_command_reply_converts_within_size_cap() {
    let message_id = "c9b1f7b0-1a2b-4c3d-8e4f-0123456789ab";
    let result = document_result(message_id, ResultType::RunCommandResult, 80_000);
    let reply = RunCommandReply::new(message_id, result, false, 1_700_000_000_000);

    assert_eq!(reply.number_of_continuous_retries(), 1);
    assert_eq!(reply.back_off_seconds(), 1);
    assert!(reply.should_persist_data());

    let message = reply.convert_to_agent_message().expect("within cap");
    assert_eq!(message.message_type, MessageType::AGENT_JOB_REPLY);
    let body: serde_json::Value = serde_json::from_slice(&message.payload).expect("valid json");
    assert_eq!(body["topic"], "aws.ssm.sendCommand");
}

#[test]
fn run_command_reply_over_cap_is_rejected_with_uuid_in_message() {
    let message_id = "c9b1f7b0-1a2b-4c3d-8e4f-0123456789ab";
    let result = document_result(message_id, ResultType::RunCommandResult, 200_000);
    let reply = RunCommandReply::new(message_id, result, false, 1_700_000_000_000);

    let err = reply.convert_to_agent_message().unwrap_err();
    assert_eq!(err.code, ErrorCode::ReplyTooLarge);
    assert!(err.message.contains(message_id));
}

#[test]
fn cancel_command_selects_cancel_topic_in_reply_body() {
    let message_id = "c9b1f7b0-1a2b-4c3d-8e4f-0123456789ab";
    let result = document_result(message_id, ResultType::RunCommandResult, 10);
    let reply = RunCommandReply::new(message_id, result, true, 1_700_000_000_000);
    let message = reply.convert_to_agent_message().expect("within cap");
    let body: serde_json::Value = serde_json::from_slice(&message.payload).expect("valid json");
    assert_eq!(body["topic"], "aws.ssm.cancelCommand");
}

#[test]
fn session_complete_reply_is_not_persisted_and_retries_three_times() {
    let message_id = "c9b1f7b0-1a2b-4c3d-8e4f-0123456789ab";
    let result = document_result(message_id, ResultType::SessionResult, 10);
    let reply = SessionCompleteReply::new(message_id, result, "i-0123456789abcdef0", 1_700_000_000_000);
    assert!(!reply.should_persist_data());
    assert_eq!(reply.number_of_continuous_retries(), 3);

    let message = reply.convert_to_agent_message().expect("builds");
    assert_eq!(message.message_type, MessageType::AGENT_TASK_COMPLETE);
}

#[test]
fn session_complete_reply_surfaces_error_over_output() {
    let message_id = "c9b1f7b0-1a2b-4c3d-8e4f-0123456789ab";
    let mut result = document_result(message_id, ResultType::SessionResult, 0);
    result.plugin_results.get_mut("1").expect("plugin 1").error = "boom".to_string();
    let reply = SessionCompleteReply::new(message_id, result, "i-0123456789abcdef0", 1_700_000_000_000);

    let message = reply.convert_to_agent_message().expect("builds");
    let body: serde_json::Value = serde_json::from_slice(&message.payload).expect("valid json");
    assert_eq!(body["output"], "boom");
}

#[test]
fn session_complete_reply_unpacks_structured_output() {
    let message_id = "c9b1f7b0-1a2b-4c3d-8e4f-0123456789ab";
    let mut result = document_result(message_id, ResultType::SessionResult, 0);
    let mut output_map = std::collections::BTreeMap::new();
    output_map.insert("output".to_string(), Value::Str("done".to_string()));
    output_map.insert("s3Bucket".to_string(), Value::Str("my-bucket".to_string()));
    result.plugin_results.get_mut("1").expect("plugin 1").output = Value::Map(output_map);
    let reply = SessionCompleteReply::new(message_id, result, "i-0123456789abcdef0", 1_700_000_000_000);

    let message = reply.convert_to_agent_message().expect("builds");
    let body: serde_json::Value = serde_json::from_slice(&message.payload).expect("valid json");
    assert_eq!(body["output"]["output"], "done");
    assert_eq!(body["output"]["s3Bucket"], "my-bucket");
}

#[test]
fn increment_retries_advances_retry_number() {
    let message_id = "c9b1f7b0-1a2b-4c3d-8e4f-0123456789ab";
    let result = document_result(message_id, ResultType::RunCommandResult, 10);
    let mut reply = RunCommandReply::new(message_id, result, false, 1);
    assert_eq!(reply.retry_number(), 0);
    reply.increment_retries();
    assert_eq!(reply.retry_number(), 1);
}
