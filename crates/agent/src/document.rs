// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Document JSON parsing (§3/§6 expansion): turns the control plane's wire
//! JSON into a [`Document`]. Malformed documents are rejected before any
//! step runs, matching the "wire frame malformed -> discard, don't tear
//! down the connection" posture of §7, applied at the document-parse
//! boundary instead of the frame boundary.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::error::{CodedError, ErrorCode};
use crate::model::{Document, OnFailure, OnSuccess, PluginConfiguration, PluginResult, PluginState, PropertiesShape};
use crate::precondition::PreconditionArg;
use crate::value::Value;

pub fn parse_document(json: &str) -> Result<Document, CodedError> {
    let root: Json = serde_json::from_str(json)
        .map_err(|e| CodedError::new(ErrorCode::FrameMalformed, format!("malformed document json: {e}")))?;

    let parameters = root
        .get("parameters")
        .and_then(Json::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect())
        .unwrap_or_default();

    let plugins_json = root
        .get("plugins")
        .and_then(Json::as_array)
        .ok_or_else(|| CodedError::new(ErrorCode::FrameMalformed, "document missing a \"plugins\" array"))?;

    let plugins = plugins_json.iter().map(parse_plugin_state).collect::<Result<Vec<_>, _>>()?;

    Ok(Document { plugins, parameters })
}

fn parse_plugin_state(entry: &Json) -> Result<PluginState, CodedError> {
    let id = entry
        .get("id")
        .and_then(Json::as_str)
        .ok_or_else(|| CodedError::new(ErrorCode::FrameMalformed, "plugin entry missing \"id\""))?
        .to_string();
    let name = entry
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| CodedError::new(ErrorCode::FrameMalformed, "plugin entry missing \"name\""))?
        .to_string();

    let empty = Json::Null;
    let config_json = entry.get("configuration").unwrap_or(&empty);
    let configuration = parse_configuration(config_json, &id, &name)?;

    let result = PluginResult::new(configuration.plugin_id.clone(), configuration.plugin_name.clone());
    Ok(PluginState { id, name, configuration, result })
}

fn parse_configuration(json: &Json, id: &str, name: &str) -> Result<PluginConfiguration, CodedError> {
    let plugin_id = json.get("pluginId").and_then(Json::as_str).unwrap_or(id).to_string();
    let plugin_name = json.get("pluginName").and_then(Json::as_str).unwrap_or(name).to_string();

    let properties = match json.get("properties") {
        Some(Json::Array(items)) => PropertiesShape::Sequence(items.iter().map(Value::from_json).collect()),
        Some(other) => PropertiesShape::Single(Value::from_json(other)),
        None => PropertiesShape::Single(Value::Null),
    };

    // Control-flow modifiers are properties of the step (§6: "case-sensitive
    // strings in configuration.properties"), only recognized when properties
    // is a single object — a sequence step has no single set of modifiers.
    let (on_failure, on_success, finally) = match &properties {
        PropertiesShape::Single(Value::Map(map)) => (
            map.get("onFailure").and_then(Value::as_str).and_then(parse_on_failure),
            map.get("onSuccess").and_then(Value::as_str).and_then(parse_on_success),
            map.get("finally").and_then(Value::as_str).map(|s| s == "true").unwrap_or(false),
        ),
        _ => (None, None, false),
    };

    Ok(PluginConfiguration {
        plugin_id,
        plugin_name,
        properties,
        is_precondition_enabled: json.get("isPreconditionEnabled").and_then(Json::as_bool).unwrap_or(false),
        preconditions: parse_preconditions(json.get("preconditions"))?,
        output_s3_bucket_name: json.get("outputS3BucketName").and_then(Json::as_str).map(str::to_string),
        output_s3_key_prefix: json.get("outputS3KeyPrefix").and_then(Json::as_str).map(str::to_string),
        cloud_watch_log_group: json.get("cloudWatchLogGroup").and_then(Json::as_str).map(str::to_string),
        session_id: json.get("sessionId").and_then(Json::as_str).map(str::to_string),
        run_as_user: json.get("runAsUser").and_then(Json::as_str).map(str::to_string),
        shell_profile: json.get("shellProfile").and_then(Json::as_str).map(str::to_string),
        on_failure,
        on_success,
        finally,
    })
}

fn parse_on_failure(s: &str) -> Option<OnFailure> {
    match s {
        "exit" => Some(OnFailure::Exit),
        "successAndExit" => Some(OnFailure::SuccessAndExit),
        _ => None,
    }
}

fn parse_on_success(s: &str) -> Option<OnSuccess> {
    match s {
        "exit" => Some(OnSuccess::Exit),
        _ => None,
    }
}

fn parse_preconditions(json: Option<&Json>) -> Result<BTreeMap<String, Vec<PreconditionArg>>, CodedError> {
    let Some(Json::Object(map)) = json else { return Ok(BTreeMap::new()) };

    let mut out = BTreeMap::new();
    for (operator, args_json) in map {
        let args_array = args_json
            .as_array()
            .ok_or_else(|| CodedError::new(ErrorCode::FrameMalformed, format!("precondition {operator:?} must be an array")))?;
        let args = args_array
            .iter()
            .map(|a| {
                a.as_str()
                    .map(PreconditionArg::literal)
                    .ok_or_else(|| CodedError::new(ErrorCode::FrameMalformed, format!("precondition {operator:?} argument must be a string")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.insert(operator.clone(), args);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
