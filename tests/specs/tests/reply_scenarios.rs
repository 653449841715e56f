// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Reply classification and size-cap scenarios against the public `reply`
//! API, independent of the document runner that produces a `DocumentResult`
//! in the running agent.

use std::collections::BTreeMap;

use ssmagent::error::ErrorCode;
use ssmagent::model::{DocumentResult, PluginResult, PluginStatus, ResultType};
use ssmagent::reply::{select_topic, Reply, RunCommandReply, SessionCompleteReply, Topic, REPLY_SIZE_CAP};
use ssm_wire::MessageType;

fn plugin_result(status: PluginStatus) -> PluginResult {
    let mut result = PluginResult::new("0.aws:runScript", "aws:runScript");
    result.status = status;
    result
}

fn document_result(result_type: ResultType, status: PluginStatus) -> DocumentResult {
    let mut plugin_results = BTreeMap::new();
    plugin_results.insert("0.aws:runScript".to_string(), plugin_result(status));
    DocumentResult {
        message_id: uuid::Uuid::new_v4().to_string(),
        result_type,
        related_document_type: "Command".to_string(),
        last_plugin: "0.aws:runScript".to_string(),
        plugin_results,
        status,
    }
}

#[test]
fn run_command_result_selects_send_command_topic() {
    assert_eq!(select_topic(&ResultType::RunCommandResult, false), Some(Topic::SendCommand));
}

#[test]
fn run_command_result_under_cancel_selects_cancel_command_topic() {
    assert_eq!(select_topic(&ResultType::RunCommandResult, true), Some(Topic::CancelCommand));
}

#[test]
fn session_result_has_no_topic() {
    assert_eq!(select_topic(&ResultType::SessionResult, false), None);
    assert_eq!(select_topic(&ResultType::SessionResult, true), None);
}

#[test]
fn run_command_reply_frames_as_agent_job_reply() {
    let result = document_result(ResultType::RunCommandResult, PluginStatus::Success);
    let message_id = result.message_id.clone();
    let reply = RunCommandReply::new(message_id, result, false, 1_700_000_000_000);

    let message = reply.convert_to_agent_message().expect("reply fits under the size cap");
    assert_eq!(message.message_type, MessageType::AGENT_JOB_REPLY);
    let body = String::from_utf8_lossy(&message.payload);
    assert!(body.contains("aws.ssm.sendCommand"));
}

#[test]
fn session_complete_reply_frames_as_agent_task_complete() {
    let result = document_result(ResultType::SessionResult, PluginStatus::Success);
    let message_id = result.message_id.clone();
    let reply = SessionCompleteReply::new(message_id, result, "i-0123456789abcdef0", 1_700_000_000_000);

    let message = reply.convert_to_agent_message().expect("reply fits under the size cap");
    assert_eq!(message.message_type, MessageType::AGENT_TASK_COMPLETE);
    let body = String::from_utf8_lossy(&message.payload);
    assert!(body.contains("agent_task_complete"));
    assert!(body.contains("i-0123456789abcdef0"));
}

#[test]
fn run_command_reply_over_size_cap_is_rejected() {
    let mut result = document_result(ResultType::RunCommandResult, PluginStatus::Success);
    let oversized = "x".repeat(REPLY_SIZE_CAP + 1);
    if let Some(r) = result.plugin_results.get_mut("0.aws:runScript") {
        r.standard_output = oversized;
    }

    let message_id = result.message_id.clone();
    let reply = RunCommandReply::new(message_id, result, false, 1_700_000_000_000);

    let err = reply.convert_to_agent_message().expect_err("oversized reply must be rejected");
    assert_eq!(err.code, ErrorCode::ReplyTooLarge);
}
