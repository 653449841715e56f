// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Cross-platform precondition evaluator (component B, §4.2).

use std::collections::BTreeMap;

/// One `StringEquals`-style argument: the value as originally authored and
/// the value after parameter substitution. Equal when nothing was
/// substituted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionArg {
    pub initial: String,
    pub resolved: String,
}

impl PreconditionArg {
    pub fn literal(value: impl Into<String>) -> Self {
        let value = value.into();
        Self { resolved: value.clone(), initial: value }
    }

    pub fn substituted(initial: impl Into<String>, resolved: impl Into<String>) -> Self {
        Self { initial: initial.into(), resolved: resolved.into() }
    }

    fn was_substituted(&self) -> bool {
        self.initial != self.resolved
    }

    /// True if substitution left a `{{ name }}` token in place — the
    /// parameter it names wasn't supplied, so `resolved` still carries it.
    fn has_unresolved_reference(&self) -> bool {
        self.resolved.contains("{{") && self.resolved.contains("}}")
    }
}

/// `(allowed, unrecognized)` per §4.2.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvalResult {
    pub allowed: bool,
    pub unrecognized: Vec<String>,
}

impl EvalResult {
    fn allow() -> Self {
        Self { allowed: true, unrecognized: Vec::new() }
    }

    fn skip() -> Self {
        Self { allowed: false, unrecognized: Vec::new() }
    }

    fn unrecognized_with(message: impl Into<String>) -> Self {
        Self { allowed: false, unrecognized: vec![message.into()] }
    }
}

const PLATFORM_TYPE_SENTINEL: &str = "platformType";

/// Evaluate every `operator -> [arg0, arg1]` entry against `platform_type`
/// (already lowercased by the caller) and fold the per-operator outcomes
/// into one `(allowed, unrecognized)` pair.
pub fn evaluate(preconditions: &BTreeMap<String, Vec<PreconditionArg>>, platform_type: &str) -> EvalResult {
    if preconditions.is_empty() {
        return EvalResult::allow();
    }

    let mut allowed = true;
    let mut unrecognized = Vec::new();

    for (operator, args) in preconditions {
        let result = evaluate_one(operator, args, platform_type);
        allowed = allowed && result.allowed;
        unrecognized.extend(result.unrecognized);
    }

    EvalResult { allowed, unrecognized }
}

fn evaluate_one(operator: &str, args: &[PreconditionArg], platform_type: &str) -> EvalResult {
    if operator != "StringEquals" {
        return EvalResult::unrecognized_with(format!("unrecognized precondition operator {operator:?}"));
    }

    // 1. Arity.
    if args.len() != 2 {
        return EvalResult::unrecognized_with(format!(
            "StringEquals requires exactly 2 arguments, got {}",
            args.len()
        ));
    }
    let (a, b) = (&args[0], &args[1]);

    // 2. The two initial values must differ, unless one side names platformType.
    let a_is_platform = a.initial == PLATFORM_TYPE_SENTINEL;
    let b_is_platform = b.initial == PLATFORM_TYPE_SENTINEL;
    if a.initial == b.initial && !a_is_platform && !b_is_platform {
        return EvalResult::unrecognized_with("StringEquals arguments are identical literals");
    }

    // 3. Neither side may still carry an unresolved parameter reference.
    if a.has_unresolved_reference() || b.has_unresolved_reference() {
        return EvalResult::unrecognized_with("StringEquals argument has an unresolved parameter reference");
    }

    // 4. platformType comparison.
    if a_is_platform || b_is_platform {
        let (platform_arg, other) = if a_is_platform { (a, b) } else { (b, a) };
        if platform_arg.initial != platform_arg.resolved {
            return EvalResult::unrecognized_with("platformType must not be substituted");
        }
        return if other.resolved.eq_ignore_ascii_case(platform_type) {
            EvalResult::allow()
        } else {
            EvalResult::skip()
        };
    }

    // 5. Arbitrary StringEquals: at least one side must have been substituted.
    if !a.was_substituted() && !b.was_substituted() {
        return EvalResult::unrecognized_with("StringEquals requires at least one substituted argument");
    }

    if a.resolved != b.resolved {
        EvalResult::skip()
    } else {
        EvalResult::allow()
    }
}

#[cfg(test)]
#[path = "precondition_tests.rs"]
mod tests;
