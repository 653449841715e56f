// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! End-to-end document scenarios: JSON text in, through
//! `document::parse_document` and `runner::run`, to per-step results.
//! Exercises the same registry/oracle wiring the running agent builds
//! (`orchestrator::build_registry`/`build_oracle`), not a test-only double.

use std::collections::BTreeMap;

use ssmagent::cancel::CancelFlag;
use ssmagent::document::parse_document;
use ssmagent::model::PluginStatus;
use ssmagent::orchestrator::{build_oracle, build_registry};
use ssmagent::runner::{self, RunnerConfig};
use tokio::sync::mpsc;

async fn run_document(json: &serde_json::Value) -> BTreeMap<String, ssmagent::model::PluginResult> {
    let mut document = parse_document(&json.to_string()).expect("document under test is well-formed");
    let registry = build_registry();
    let oracle = build_oracle();
    let config = RunnerConfig::default();
    let (tx, _rx) = mpsc::channel(document.plugins.len().max(1));
    let cancel = CancelFlag::new();
    runner::run(&mut document, &registry, &oracle, &config, tx, &cancel).await
}

#[tokio::test]
async fn sequential_steps_with_parameter_substitution() {
    let json = serde_json::json!({
        "parameters": { "message": "integration-hello" },
        "plugins": [
            {
                "id": "0.aws:runScript",
                "name": "aws:runScript",
                "configuration": { "properties": { "runCommand": ["echo {{ message }}"] } }
            },
            {
                "id": "1.aws:runScript",
                "name": "aws:runScript",
                "configuration": { "properties": { "runCommand": ["echo {{ message }}-again"] } }
            }
        ]
    });

    let results = run_document(&json).await;

    assert_eq!(results.len(), 2);
    let first = &results["0.aws:runScript"];
    assert_eq!(first.status, PluginStatus::Success);
    assert_eq!(first.standard_output.trim(), "integration-hello");

    let second = &results["1.aws:runScript"];
    assert_eq!(second.status, PluginStatus::Success);
    assert_eq!(second.standard_output.trim(), "integration-hello-again");
}

#[tokio::test]
async fn exit_168_marks_success_and_skips_remaining_steps() {
    let json = serde_json::json!({
        "plugins": [
            { "id": "0", "name": "aws:runScript", "configuration": { "properties": { "runCommand": ["exit 168"] } } },
            { "id": "1", "name": "aws:runScript", "configuration": { "properties": { "runCommand": ["echo should-not-run"] } } }
        ]
    });

    let results = run_document(&json).await;

    assert_eq!(results["0"].status, PluginStatus::Success);
    assert_eq!(results["0"].code, 168);
    assert_eq!(results["1"].status, PluginStatus::Skipped);
    assert_eq!(results["1"].code, 0);
}

#[tokio::test]
async fn exit_169_marks_failure_and_skips_remaining_steps() {
    let json = serde_json::json!({
        "plugins": [
            { "id": "0", "name": "aws:runScript", "configuration": { "properties": { "runCommand": ["exit 169"] } } },
            { "id": "1", "name": "aws:runScript", "configuration": { "properties": { "runCommand": ["echo should-not-run"] } } }
        ]
    });

    let results = run_document(&json).await;

    assert_eq!(results["0"].status, PluginStatus::Failed);
    assert_eq!(results["0"].code, 169);
    assert_eq!(results["1"].status, PluginStatus::Skipped);
}

#[tokio::test]
async fn on_failure_exit_cascades_but_finally_still_runs() {
    let json = serde_json::json!({
        "plugins": [
            {
                "id": "0",
                "name": "aws:runScript",
                "configuration": { "properties": { "runCommand": ["exit 1"], "onFailure": "exit" } }
            },
            {
                "id": "1",
                "name": "aws:runScript",
                "configuration": { "properties": { "runCommand": ["echo middle"] } }
            },
            {
                "id": "2",
                "name": "aws:runScript",
                "configuration": { "properties": { "runCommand": ["echo cleanup"], "finally": "true" } }
            }
        ]
    });

    let results = run_document(&json).await;

    assert_eq!(results["0"].status, PluginStatus::Failed);
    assert_eq!(results["1"].status, PluginStatus::Skipped);
    assert_eq!(results["2"].status, PluginStatus::Success);
    assert_eq!(results["2"].standard_output.trim(), "cleanup");
}
