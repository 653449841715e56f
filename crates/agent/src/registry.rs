// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Plugin registry and capability oracle (component C, §4.3).
//!
//! "Known" and "registered" are deliberately distinct: the registry answers
//! whether *this agent build* has a factory for a plugin name; the oracle
//! answers whether the name is recognized at all in the universe of plugins
//! the agent understands. The runner (D) uses both to distinguish "unknown
//! plugin, go upgrade the agent" from "known, just not on this platform".

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cancel::CancelFlag;
use crate::error::CodedError;
use crate::value::Value;

/// Everything a plugin invocation needs besides its own properties.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    pub plugin_name: String,
    pub step_name: String,
    pub session_id: Option<String>,
    pub run_as_user: Option<String>,
    pub shell_profile: Option<String>,
}

/// What a plugin invocation produced, before the runner applies exit-code
/// rewrites and truncation (§4.4).
#[derive(Debug, Clone, Default)]
pub struct PluginOutcome {
    pub success: bool,
    pub reboot: bool,
    pub code: i32,
    pub error: String,
    pub output: Value,
    pub standard_output: String,
    pub standard_error: String,
}

impl PluginOutcome {
    pub fn success(output: Value) -> Self {
        Self { success: true, output, ..Default::default() }
    }

    pub fn failure(code: i32, error: impl Into<String>) -> Self {
        Self { success: false, code, error: error.into(), ..Default::default() }
    }
}

/// The plugin invocation contract (§1: business logic out of scope, only
/// this interface is specified).
#[async_trait]
pub trait Plugin: Send {
    async fn execute(&mut self, ctx: &PluginContext, properties: &Value, cancel: &CancelFlag) -> PluginOutcome;
}

pub type PluginFactory = Arc<dyn Fn(&PluginContext) -> Result<Box<dyn Plugin>, CodedError> + Send + Sync>;

/// Maps plugin name to factory. Read-only after boot (§5 shared resources).
#[derive(Clone, Default)]
pub struct Registry {
    factories: BTreeMap<String, PluginFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn is_handler(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str, ctx: &PluginContext) -> Result<Box<dyn Plugin>, CodedError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| CodedError::new(crate::error::ErrorCode::UnknownPlugin, format!("no factory registered for {name:?}")))?;
        factory(ctx)
    }
}

/// Support level for one plugin name on the current platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    /// Registered and runnable on every platform.
    AllPlatforms,
    /// Registered and runnable only on the listed platforms.
    Restricted,
    /// Not runnable on this platform at all.
    Unsupported,
}

#[derive(Debug, Clone)]
struct KnownPlugin {
    platforms: Option<Vec<String>>,
}

/// Answers `(isKnown, isSupported, message)` for a plugin name (§4.3).
#[derive(Debug, Clone, Default)]
pub struct CapabilityOracle {
    known: BTreeMap<String, KnownPlugin>,
}

impl CapabilityOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `platforms = None` means supported everywhere.
    pub fn declare(&mut self, name: impl Into<String>, platforms: Option<Vec<String>>) {
        self.known.insert(name.into(), KnownPlugin { platforms });
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains_key(name)
    }

    pub fn is_supported(&self, name: &str, platform_type: &str) -> bool {
        match self.known.get(name) {
            None => false,
            Some(KnownPlugin { platforms: None }) => true,
            Some(KnownPlugin { platforms: Some(list) }) => {
                list.iter().any(|p| p.eq_ignore_ascii_case(platform_type))
            }
        }
    }

    /// Coarser-grained view of [`is_known`]/[`is_supported`], used by
    /// callers that just want to branch on support level (e.g. a future
    /// platform-filtering step of document admission) rather than the raw
    /// booleans `describe` returns.
    pub fn support(&self, name: &str, platform_type: &str) -> Support {
        match self.known.get(name) {
            None => Support::Unsupported,
            Some(KnownPlugin { platforms: None }) => Support::AllPlatforms,
            Some(KnownPlugin { platforms: Some(list) }) => {
                if list.iter().any(|p| p.eq_ignore_ascii_case(platform_type)) {
                    Support::Restricted
                } else {
                    Support::Unsupported
                }
            }
        }
    }

    /// `(isKnown, isSupported, message)`.
    pub fn describe(&self, name: &str, platform_type: &str) -> (bool, bool, String) {
        let is_known = self.is_known(name);
        if !is_known {
            return (false, false, format!("plugin {name:?} is not known to this agent; update the agent"));
        }
        let is_supported = self.is_supported(name, platform_type);
        let message = if is_supported {
            String::new()
        } else {
            format!("plugin {name:?} is not supported on platform {platform_type:?}")
        };
        (is_known, is_supported, message)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
