use super::*;
use crate::model::{PluginConfiguration, PropertiesShape};
use crate::registry::{Plugin, PluginOutcome};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Replays one scripted outcome per call from a queue shared across every
/// plugin instance the registry hands out, capturing the properties each
/// call was invoked with so tests can assert substitution happened upstream.
struct ScriptedPlugin {
    outcomes: Arc<Mutex<VecDeque<PluginOutcome>>>,
    calls: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    async fn execute(&mut self, _ctx: &PluginContext, properties: &Value, _cancel: &CancelFlag) -> PluginOutcome {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(properties.clone());
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| PluginOutcome::success(Value::Null))
    }
}

fn registry_with(name: &str, outcomes: Vec<PluginOutcome>) -> (Registry, Arc<Mutex<Vec<Value>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let calls_clone = calls.clone();
    let queue = Arc::new(Mutex::new(VecDeque::from(outcomes)));
    let mut registry = Registry::new();
    registry.register(
        name.to_string(),
        Arc::new(move |_ctx: &PluginContext| {
            Ok(Box::new(ScriptedPlugin { outcomes: queue.clone(), calls: calls_clone.clone() }) as Box<dyn Plugin>)
        }),
    );
    (registry, calls)
}

fn always_succeed_registry(name: &str) -> Registry {
    registry_with(name, vec![]).0
}

fn oracle_with(name: &str) -> CapabilityOracle {
    let mut oracle = CapabilityOracle::new();
    oracle.declare(name, None);
    oracle
}

fn step(id: &str, plugin_name: &str, properties: Value) -> PluginState {
    PluginState {
        id: id.to_string(),
        name: plugin_name.to_string(),
        configuration: PluginConfiguration {
            plugin_id: id.to_string(),
            plugin_name: plugin_name.to_string(),
            properties: PropertiesShape::Single(properties),
            is_precondition_enabled: false,
            ..Default::default()
        },
        result: PluginResult::new(id, plugin_name),
    }
}

#[tokio::test]
async fn sequential_steps_with_parameter_substitution() {
    let mut params = BTreeMap::new();
    params.insert("cmd".to_string(), Value::Str("echo hi".to_string()));

    let mut document = Document {
        plugins: vec![
            step("0.aws:runScript", "aws:runScript", Value::Str("{{ cmd }}".to_string())),
            step("1.aws:runScript", "aws:runScript", Value::Str("{{ cmd }}".to_string())),
        ],
        parameters: params,
    };

    let (registry, calls) = registry_with("aws:runScript", vec![]);
    let oracle = oracle_with("aws:runScript");
    let config = RunnerConfig::default();
    let (tx, _rx) = mpsc::channel(document.plugins.len());
    let cancel = CancelFlag::new();

    let results = run(&mut document, &registry, &oracle, &config, tx, &cancel).await;

    assert_eq!(results.len(), 2);
    for result in results.values() {
        assert_eq!(result.status, PluginStatus::Success);
    }
    let recorded = calls.lock().unwrap_or_else(|e| e.into_inner());
    assert_eq!(recorded.len(), 2);
    for call in recorded.iter() {
        assert_eq!(call, &Value::Str("echo hi".to_string()));
    }
}

#[tokio::test]
async fn exit_168_halts_with_success_and_skips_remaining() {
    let mut document = Document {
        plugins: vec![
            step("1", "aws:runScript", Value::Null),
            step("2", "aws:runScript", Value::Null),
            step("3", "aws:runScript", Value::Null),
        ],
        parameters: BTreeMap::new(),
    };

    let (registry, _calls) = registry_with(
        "aws:runScript",
        vec![PluginOutcome { success: false, code: EXIT_WITH_SUCCESS, ..Default::default() }],
    );
    let oracle = oracle_with("aws:runScript");
    let config = RunnerConfig::default();
    let (tx, _rx) = mpsc::channel(document.plugins.len());
    let cancel = CancelFlag::new();

    let results = run(&mut document, &registry, &oracle, &config, tx, &cancel).await;

    let first = &results["1"];
    assert_eq!(first.status, PluginStatus::Success);
    assert_eq!(first.code, EXIT_WITH_SUCCESS);
    assert!(first.standard_output.contains("Step exited with code 168"));

    assert_eq!(results["2"].status, PluginStatus::Skipped);
    assert_eq!(results["2"].code, 0);
    assert_eq!(results["3"].status, PluginStatus::Skipped);
    assert_eq!(results["3"].code, 0);
}

#[tokio::test]
async fn finally_step_runs_after_on_failure_exit() {
    let mut failing = step("1", "aws:runScript", Value::Null);
    failing.configuration.on_failure = Some(OnFailure::Exit);
    let skip_candidate = step("2", "aws:runScript", Value::Null);
    let mut finally_step = step("3", "aws:runScript", Value::Null);
    finally_step.configuration.finally = true;

    let mut document = Document {
        plugins: vec![failing, skip_candidate, finally_step],
        parameters: BTreeMap::new(),
    };

    let (registry, _calls) = registry_with(
        "aws:runScript",
        vec![PluginOutcome::failure(1, "boom"), PluginOutcome::success(Value::Null)],
    );
    let oracle = oracle_with("aws:runScript");
    let config = RunnerConfig::default();
    let (tx, _rx) = mpsc::channel(document.plugins.len());
    let cancel = CancelFlag::new();

    let results = run(&mut document, &registry, &oracle, &config, tx, &cancel).await;

    assert_eq!(results["1"].status, PluginStatus::Failed);
    assert_eq!(results["2"].status, PluginStatus::Skipped);
    assert_eq!(results["3"].status, PluginStatus::Success);
}

#[tokio::test]
async fn unknown_plugin_fails_the_step() {
    let mut document = Document { plugins: vec![step("1", "aws:mystery", Value::Null)], parameters: BTreeMap::new() };
    let registry = Registry::new();
    let oracle = CapabilityOracle::new();
    let config = RunnerConfig::default();
    let (tx, _rx) = mpsc::channel(1);
    let cancel = CancelFlag::new();

    let results = run(&mut document, &registry, &oracle, &config, tx, &cancel).await;
    assert_eq!(results["1"].status, PluginStatus::Failed);
}

#[tokio::test]
async fn unsupported_on_platform_skips_cross_platform_document() {
    let mut step = step("1", "aws:domainJoin", Value::Null);
    step.configuration.is_precondition_enabled = true;
    let mut document = Document { plugins: vec![step], parameters: BTreeMap::new() };

    let registry = always_succeed_registry("aws:domainJoin");
    let mut oracle = CapabilityOracle::new();
    oracle.declare("aws:domainJoin", Some(vec!["windows".to_string()]));
    let config = RunnerConfig { platform_type: "linux".to_string(), ..RunnerConfig::default() };
    let (tx, _rx) = mpsc::channel(1);
    let cancel = CancelFlag::new();

    let results = run(&mut document, &registry, &oracle, &config, tx, &cancel).await;
    assert_eq!(results["1"].status, PluginStatus::Skipped);
    assert_eq!(results["1"].code, 0);
}

#[tokio::test]
async fn plugin_panic_is_caught_and_marks_step_failed() {
    struct PanicPlugin;

    #[async_trait]
    impl Plugin for PanicPlugin {
        async fn execute(&mut self, _ctx: &PluginContext, _properties: &Value, _cancel: &CancelFlag) -> PluginOutcome {
            panic!("deliberate test panic");
        }
    }

    let mut document = Document { plugins: vec![step("1", "test:panic", Value::Null)], parameters: BTreeMap::new() };
    let mut registry = Registry::new();
    registry.register("test:panic", Arc::new(|_ctx: &PluginContext| Ok(Box::new(PanicPlugin) as Box<dyn Plugin>)));
    let oracle = oracle_with("test:panic");
    let config = RunnerConfig::default();
    let (tx, _rx) = mpsc::channel(1);
    let cancel = CancelFlag::new();

    let results = run(&mut document, &registry, &oracle, &config, tx, &cancel).await;
    let result = &results["1"];
    assert_eq!(result.status, PluginStatus::Failed);
    assert!(result.error.contains("Plugin crashed with message"));
}

#[test]
fn truncate_output_keeps_tail_and_prepends_suffix() {
    let truncated = truncate_output("0123456789", 4, "...");
    assert_eq!(truncated, "...6789");
    assert_eq!(truncate_output("short", 10, "..."), "short");
}
