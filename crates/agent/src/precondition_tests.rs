use super::*;

fn map(entries: Vec<(&str, Vec<PreconditionArg>)>) -> BTreeMap<String, Vec<PreconditionArg>> {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[test]
fn empty_preconditions_allow() {
    let result = evaluate(&BTreeMap::new(), "linux");
    assert_eq!(result, EvalResult::allow());
}

#[test]
fn platform_type_match_is_case_insensitive() {
    let pre = map(vec![(
        "StringEquals",
        vec![PreconditionArg::literal("platformType"), PreconditionArg::literal("Linux")],
    )]);
    let result = evaluate(&pre, "linux");
    assert_eq!(result, EvalResult::allow());
}

#[test]
fn platform_type_mismatch_skips_without_unrecognized() {
    let pre = map(vec![(
        "StringEquals",
        vec![PreconditionArg::literal("platformType"), PreconditionArg::literal("windows")],
    )]);
    let result = evaluate(&pre, "linux");
    assert_eq!(result, EvalResult::skip());
}

#[test]
fn platform_type_order_is_irrelevant() {
    let pre = map(vec![(
        "StringEquals",
        vec![PreconditionArg::literal("windows"), PreconditionArg::literal("platformType")],
    )]);
    let result = evaluate(&pre, "windows");
    assert!(result.allowed);
}

#[test]
fn wrong_arity_is_unrecognized() {
    let pre = map(vec![("StringEquals", vec![PreconditionArg::literal("a")])]);
    let result = evaluate(&pre, "linux");
    assert!(!result.allowed);
    assert_eq!(result.unrecognized.len(), 1);
}

#[test]
fn unknown_operator_is_unrecognized() {
    let pre = map(vec![("NumericEquals", vec![PreconditionArg::literal("1"), PreconditionArg::literal("2")])]);
    let result = evaluate(&pre, "linux");
    assert!(!result.allowed);
    assert_eq!(result.unrecognized, vec!["unrecognized precondition operator \"NumericEquals\""]);
}

#[test]
fn identical_literals_without_platform_type_are_unrecognized() {
    let pre = map(vec![("StringEquals", vec![PreconditionArg::literal("x"), PreconditionArg::literal("x")])]);
    let result = evaluate(&pre, "linux");
    assert!(!result.allowed);
    assert_eq!(result.unrecognized.len(), 1);
}

#[test]
fn unresolved_reference_is_unrecognized() {
    let pre = map(vec![(
        "StringEquals",
        vec![
            PreconditionArg::substituted("{{ env }}", "{{ env }}"),
            PreconditionArg::literal("prod"),
        ],
    )]);
    let result = evaluate(&pre, "linux");
    assert!(!result.allowed);
    assert_eq!(result.unrecognized.len(), 1);
}

#[test]
fn platform_type_must_not_be_substituted() {
    let pre = map(vec![(
        "StringEquals",
        vec![
            PreconditionArg::substituted("platformType", "somethingElse"),
            PreconditionArg::literal("linux"),
        ],
    )]);
    let result = evaluate(&pre, "linux");
    assert!(!result.allowed);
    assert_eq!(result.unrecognized.len(), 1);
}

#[test]
fn arbitrary_string_equals_requires_a_substitution() {
    let pre = map(vec![("StringEquals", vec![PreconditionArg::literal("a"), PreconditionArg::literal("b")])]);
    let result = evaluate(&pre, "linux");
    assert!(!result.allowed);
    assert_eq!(result.unrecognized.len(), 1);
}

#[test]
fn arbitrary_string_equals_matches_after_substitution() {
    let pre = map(vec![(
        "StringEquals",
        vec![
            PreconditionArg::substituted("{{ env }}", "prod"),
            PreconditionArg::literal("prod"),
        ],
    )]);
    let result = evaluate(&pre, "linux");
    assert_eq!(result, EvalResult::allow());
}

#[test]
fn arbitrary_string_equals_skips_on_mismatch() {
    let pre = map(vec![(
        "StringEquals",
        vec![
            PreconditionArg::substituted("{{ env }}", "staging"),
            PreconditionArg::literal("prod"),
        ],
    )]);
    let result = evaluate(&pre, "linux");
    assert_eq!(result, EvalResult::skip());
}

#[test]
fn multiple_operators_fold_unrecognized_lists() {
    let pre = map(vec![
        ("StringEquals", vec![PreconditionArg::literal("a"), PreconditionArg::literal("b")]),
        ("NumericEquals", vec![PreconditionArg::literal("1"), PreconditionArg::literal("2")]),
    ]);
    let result = evaluate(&pre, "linux");
    assert!(!result.allowed);
    assert_eq!(result.unrecognized.len(), 2);
}
