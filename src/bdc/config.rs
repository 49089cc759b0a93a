// SPDX-License-Identifier: MIT

//! Engine configuration
//!
//! Loaded from a YAML or JSON file; every field has a default so an empty
//! document is valid. A few values can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::sdk::error::BdcError;

pub const DEFAULT_API_VERSION: &str = "2021-10-19";
pub const DEFAULT_ANALYTICS_BATCH_SIZE: usize = 300;

/// What the engine does with a step whose type has no registered resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStepPolicy {
    /// Log the miss, leave the state untouched and continue
    #[default]
    Lenient,
    /// Fail the workflow
    Strict,
}

impl std::str::FromStr for UnknownStepPolicy {
    type Err = BdcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(BdcError::config(format!(
                "unknown step policy '{}', expected 'lenient' or 'strict'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Sent as `X-Api-Version`
    pub api_version: String,
    pub headers: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
            api_version: DEFAULT_API_VERSION.to_string(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub batch_size: usize,
    /// Upload path for batched events; events are only logged when absent
    pub endpoint: Option<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_ANALYTICS_BATCH_SIZE,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub unknown_step_policy: UnknownStepPolicy,
    /// Deepest allowed nesting of spawned workflows
    pub max_depth: usize,
    pub dispatch_queue_capacity: usize,
    pub transport: TransportConfig,
    pub analytics: AnalyticsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unknown_step_policy: UnknownStepPolicy::Lenient,
            max_depth: 16,
            dispatch_queue_capacity: 256,
            transport: TransportConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BdcError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Self::parse_yaml(&content),
        }
    }

    pub fn parse_yaml(content: &str) -> Result<Self, BdcError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `BDC_BASE_URL`, `BDC_UNKNOWN_STEP_POLICY` and `BDC_MAX_DEPTH`
    pub fn apply_env(mut self) -> Result<Self, BdcError> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), BdcError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BDC_BASE_URL") {
            self.transport.base_url = Some(url);
        }
        if let Some(policy) = lookup("BDC_UNKNOWN_STEP_POLICY") {
            self.unknown_step_policy = policy.parse()?;
        }
        if let Some(depth) = lookup("BDC_MAX_DEPTH") {
            self.max_depth = depth.trim().parse().map_err(|_| {
                BdcError::config(format!("BDC_MAX_DEPTH is not a number: {}", depth))
            })?;
        }
        Ok(())
    }
}
