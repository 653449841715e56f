use super::*;

fn minimal_document_json() -> &'static str {
    r#"{
        "parameters": { "greeting": { "stringValue": "hi" } },
        "plugins": [
            {
                "id": "step1",
                "name": "aws:runScript",
                "configuration": {
                    "pluginId": "step1",
                    "pluginName": "aws:runScript",
                    "properties": { "runCommand": ["echo {{ greeting }}"], "onFailure": "exit" },
                    "isPreconditionEnabled": true,
                    "preconditions": { "StringEquals": ["platformType", "Linux"] }
                }
            }
        ]
    }"#
}

#[test]
fn parses_plugin_id_name_and_properties() {
    let doc = parse_document(minimal_document_json()).expect("should parse");
    assert_eq!(doc.plugins.len(), 1);
    let step = &doc.plugins[0];
    assert_eq!(step.id, "step1");
    assert_eq!(step.configuration.plugin_name, "aws:runScript");
    match &step.configuration.properties {
        PropertiesShape::Single(Value::Map(map)) => {
            assert!(map.contains_key("runCommand"));
        }
        other => panic!("expected a single properties map, got {other:?}"),
    }
}

#[test]
fn parses_parameters_as_nested_value_maps() {
    let doc = parse_document(minimal_document_json()).expect("should parse");
    let Value::Map(greeting) = doc.parameters.get("greeting").expect("greeting parameter present") else {
        panic!("parameters.greeting should be a map")
    };
    assert_eq!(greeting.get("stringValue"), Some(&Value::Str("hi".to_string())));
}

#[test]
fn extracts_control_flow_modifiers_from_properties() {
    let doc = parse_document(minimal_document_json()).expect("should parse");
    assert_eq!(doc.plugins[0].configuration.on_failure, Some(OnFailure::Exit));
    assert_eq!(doc.plugins[0].configuration.on_success, None);
    assert!(!doc.plugins[0].configuration.finally);
}

#[test]
fn parses_preconditions_into_literal_args() {
    let doc = parse_document(minimal_document_json()).expect("should parse");
    let args = doc.plugins[0]
        .configuration
        .preconditions
        .get("StringEquals")
        .expect("StringEquals precondition present");
    assert_eq!(args, &vec![PreconditionArg::literal("platformType"), PreconditionArg::literal("Linux")]);
}

#[test]
fn result_is_seeded_from_plugin_id_and_name() {
    let doc = parse_document(minimal_document_json()).expect("should parse");
    assert_eq!(doc.plugins[0].result.plugin_id, "step1");
    assert_eq!(doc.plugins[0].result.plugin_name, "aws:runScript");
    assert_eq!(doc.plugins[0].result.status, crate::model::PluginStatus::NotStarted);
}

#[test]
fn sequence_properties_parse_without_control_flow_modifiers() {
    let json = r#"{
        "plugins": [
            {
                "id": "step1",
                "name": "aws:runShellScript",
                "configuration": { "properties": [ { "runCommand": ["a"] }, { "runCommand": ["b"] } ] }
            }
        ]
    }"#;
    let doc = parse_document(json).expect("should parse");
    match &doc.plugins[0].configuration.properties {
        PropertiesShape::Sequence(items) => assert_eq!(items.len(), 2),
        other => panic!("expected a sequence, got {other:?}"),
    }
    assert_eq!(doc.plugins[0].configuration.on_failure, None);
}

#[test]
fn missing_plugins_array_is_rejected() {
    let err = parse_document(r#"{"parameters": {}}"#).unwrap_err();
    assert_eq!(err.code, ErrorCode::FrameMalformed);
}

#[test]
fn plugin_entry_missing_id_is_rejected() {
    let json = r#"{"plugins": [ { "name": "aws:runScript", "configuration": {} } ]}"#;
    assert!(parse_document(json).is_err());
}

#[test]
fn malformed_json_is_rejected() {
    assert!(parse_document("{not json").is_err());
}

#[test]
fn precondition_entry_that_is_not_an_array_is_rejected() {
    let json = r#"{
        "plugins": [
            { "id": "s", "name": "n", "configuration": { "preconditions": { "StringEquals": "not-an-array" } } }
        ]
    }"#;
    assert!(parse_document(json).is_err());
}

#[test]
fn plugin_without_configuration_defaults_to_null_single_properties() {
    let json = r#"{"plugins": [ { "id": "s", "name": "n" } ]}"#;
    let doc = parse_document(json).expect("should parse");
    match &doc.plugins[0].configuration.properties {
        PropertiesShape::Single(Value::Null) => {}
        other => panic!("expected Single(Null), got {other:?}"),
    }
}
