// SPDX-License-Identifier: MIT

//! Wire types for steps and workflow containers
//!
//! Field names are snake_case on the wire. Unknown fields are kept in
//! `extensions` and written back out, so additive backend changes survive a
//! decode/encode cycle.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::state::{CodableState, ReducerType};
use crate::sdk::value::DynamicValue;

/// A single backend-declared unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step-type key used to look up the resolver
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub payload: DynamicValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// State slot the resolver output is written to (defaults to the step type)
    #[serde(default, alias = "outputKey", skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// How the output is combined with an existing value in that slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reducer: Option<ReducerType>,
    /// Follow-on workflows scheduled once this step's state is adopted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<WorkflowContainer>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, DynamicValue>,
}

impl Step {
    pub fn new(step_type: impl Into<String>, payload: impl Into<DynamicValue>) -> Self {
        Self {
            step_type: step_type.into(),
            payload: payload.into(),
            id: None,
            output_key: None,
            reducer: None,
            next: Vec::new(),
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_reducer(mut self, reducer: ReducerType) -> Self {
        self.reducer = Some(reducer);
        self
    }

    pub fn with_next(mut self, workflow: WorkflowContainer) -> Self {
        self.next.push(workflow);
        self
    }

    /// State key the resolver output lands in
    pub fn output_key(&self) -> &str {
        self.output_key.as_deref().unwrap_or(&self.step_type)
    }

    /// Human readable label used in logs
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.step_type)
    }
}

/// An ordered list of steps plus the guard deciding whether it runs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowContainer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Guard expression evaluated against the incoming state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, DynamicValue>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, DynamicValue>,
}

impl WorkflowContainer {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn name(&self) -> &str {
        self.id.as_deref().unwrap_or("workflow")
    }

    /// Every step type referenced by this container and the workflows it
    /// declares through `next`
    pub fn step_types(&self) -> BTreeSet<String> {
        let mut types = BTreeSet::new();
        self.collect_step_types(&mut types);
        types
    }

    fn collect_step_types(&self, types: &mut BTreeSet<String>) {
        for step in &self.steps {
            types.insert(step.step_type.clone());
            for child in &step.next {
                child.collect_step_types(types);
            }
        }
    }
}

/// Result of one state processor invocation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateProcessorResponse {
    /// Replaces the prior state entirely
    #[serde(default, alias = "newState")]
    pub new_state: CodableState,
    #[serde(default, alias = "workflowsToRun")]
    pub workflows_to_run: Vec<WorkflowContainer>,
}

impl StateProcessorResponse {
    pub fn terminal(new_state: CodableState) -> Self {
        Self {
            new_state,
            workflows_to_run: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.workflows_to_run.is_empty()
    }
}

/// Location of a workflow inside a run, e.g. `checkout/step[2]/upsell[0]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowPath(Vec<String>);

impl WorkflowPath {
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn child(&self, label: &str, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(format!("{}[{}]", label, index));
        Self(segments)
    }

    /// Number of nested spawns below the root
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for WorkflowPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_deserialize_minimal() {
        let step: Step =
            serde_json::from_value(json!({"type": "analyticsLog", "payload": {"event": "start"}}))
                .unwrap();
        assert_eq!(step.step_type, "analyticsLog");
        assert_eq!(step.payload.get("event"), Some(&DynamicValue::from("start")));
        assert_eq!(step.output_key(), "analyticsLog");
        assert!(step.next.is_empty());
        assert!(step.extensions.is_empty());
    }

    #[test]
    fn test_step_without_payload_defaults_to_null() {
        let step: Step = serde_json::from_value(json!({"type": "noop"})).unwrap();
        assert!(step.payload.is_null());
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let raw = json!({
            "type": "httpRequest",
            "payload": {"path": "/ping"},
            "retry_hint": 3
        });
        let step: Step = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(
            step.extensions.get("retry_hint"),
            Some(&DynamicValue::from(3))
        );
        let back = serde_json::to_value(&step).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_camel_case_aliases() {
        let step: Step =
            serde_json::from_value(json!({"type": "httpRequest", "outputKey": "ping"})).unwrap();
        assert_eq!(step.output_key(), "ping");

        let response: StateProcessorResponse = serde_json::from_value(json!({
            "newState": {"a": 1},
            "workflowsToRun": [{"steps": []}]
        }))
        .unwrap();
        assert_eq!(response.new_state.get("a"), Some(&DynamicValue::from(1)));
        assert_eq!(response.workflows_to_run.len(), 1);
    }

    #[test]
    fn test_container_step_types_are_recursive() {
        let child = WorkflowContainer::new(vec![Step::new("scanCard", DynamicValue::Null)]);
        let root = WorkflowContainer::new(vec![
            Step::new("analyticsLog", DynamicValue::Null),
            Step::new("httpRequest", DynamicValue::Null).with_next(child),
        ]);
        let types: Vec<String> = root.step_types().into_iter().collect();
        assert_eq!(types, vec!["analyticsLog", "httpRequest", "scanCard"]);
    }

    #[test]
    fn test_workflow_path_display() {
        let path = WorkflowPath::root("checkout")
            .child("step", 1)
            .child("upsell", 0);
        assert_eq!(path.to_string(), "checkout/step[1]/upsell[0]");
        assert_eq!(path.depth(), 2);
        assert_eq!(WorkflowPath::root("checkout").depth(), 0);
    }
}
