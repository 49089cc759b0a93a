// SPDX-License-Identifier: MIT

//! Workflow loader - JSON/YAML document loading
//!
//! Backends deliver workflows as JSON; YAML is accepted for hand-written
//! fixtures and local experimentation.

use super::state::CodableState;
use super::types::WorkflowContainer;
use crate::sdk::error::BdcError;
use crate::sdk::value::DynamicValue;
use std::fs;
use std::path::Path;

/// Loads workflow containers and state documents from disk
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow container, choosing the format from the file extension
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowContainer, BdcError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match extension(path)? {
            Format::Json => Self::parse_json(&content),
            Format::Yaml => Self::parse_yaml(&content),
        }
    }

    /// Load an initial state document (must be an object)
    pub fn load_state<P: AsRef<Path>>(&self, path: P) -> Result<CodableState, BdcError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let value: DynamicValue = match extension(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Yaml => serde_yaml::from_str(&content)?,
        };
        CodableState::from_value(value)
            .map_err(|e| BdcError::UnsupportedFormat(format!("{}: {}", path.display(), e)))
    }

    pub fn parse_json(content: &str) -> Result<WorkflowContainer, BdcError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn parse_yaml(content: &str) -> Result<WorkflowContainer, BdcError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

enum Format {
    Json,
    Yaml,
}

fn extension(path: &Path) -> Result<Format, BdcError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        _ => Err(BdcError::UnsupportedFormat(path.display().to_string())),
    }
}
