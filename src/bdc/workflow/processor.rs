// SPDX-License-Identifier: MIT

//! State processing
//!
//! Turns a resolver output into the next state and the workflows to schedule.
//! Processing is synchronous and must not depend on the clock or any global,
//! so a workflow replays identically from the same inputs.

use std::collections::BTreeMap;

use crate::bdc::workflow::state::{CodableState, ReducerType};
use crate::bdc::workflow::types::{StateProcessorResponse, Step, WorkflowContainer};
use crate::sdk::error::DecodeError;
use crate::sdk::value::DynamicValue;

const NEW_STATE_KEY: &str = "new_state";
const WORKFLOWS_KEY: &str = "workflows_to_run";

/// Combines the current state, a step and its resolver output
pub trait StateProcessor: Send + Sync {
    fn process(
        &self,
        state: &CodableState,
        step: &Step,
        output: Option<&DynamicValue>,
    ) -> Result<StateProcessorResponse, DecodeError>;
}

/// Default processing rules:
/// - no output: state unchanged, schedule `step.next`
/// - an envelope carrying `new_state` and/or `workflows_to_run`: the envelope's
///   state replaces the current one and its workflows are scheduled after `step.next`
/// - any other output: stored under the step's output key through its reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStateProcessor;

impl DefaultStateProcessor {
    pub fn new() -> Self {
        Self
    }

    fn envelope(output: &DynamicValue) -> Option<&BTreeMap<String, DynamicValue>> {
        let fields = output.as_object().ok()?;
        let is_envelope = fields.contains_key(NEW_STATE_KEY)
            || fields.contains_key(WORKFLOWS_KEY)
            || fields.contains_key("newState")
            || fields.contains_key("workflowsToRun");
        is_envelope.then_some(fields)
    }
}

impl StateProcessor for DefaultStateProcessor {
    fn process(
        &self,
        state: &CodableState,
        step: &Step,
        output: Option<&DynamicValue>,
    ) -> Result<StateProcessorResponse, DecodeError> {
        let mut workflows_to_run = step.next.clone();

        let output = match output {
            Some(value) if !value.is_null() => value,
            _ => {
                return Ok(StateProcessorResponse {
                    new_state: state.clone(),
                    workflows_to_run,
                })
            }
        };

        if let Some(fields) = Self::envelope(output) {
            let new_state = match fields.get(NEW_STATE_KEY).or_else(|| fields.get("newState")) {
                Some(value) => CodableState::from_value(value.clone())?,
                None => state.clone(),
            };
            if let Some(extra) = fields
                .get(WORKFLOWS_KEY)
                .or_else(|| fields.get("workflowsToRun"))
            {
                let extra: Vec<WorkflowContainer> = extra.decode()?;
                workflows_to_run.extend(extra);
            }
            return Ok(StateProcessorResponse {
                new_state,
                workflows_to_run,
            });
        }

        let reducer = step.reducer.unwrap_or(ReducerType::Overwrite);
        Ok(StateProcessorResponse {
            new_state: state.with_reduced(step.output_key(), output.clone(), reducer),
            workflows_to_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(value: serde_json::Value) -> DynamicValue {
        DynamicValue::from(value)
    }

    #[test]
    fn test_no_output_keeps_state() {
        let state = CodableState::empty().with("a", v(json!(1)));
        let step = Step::new("analyticsLog", v(json!({"event": "start"})));

        let response = DefaultStateProcessor.process(&state, &step, None).unwrap();
        assert_eq!(response.new_state, state);
        assert!(response.is_terminal());

        let response = DefaultStateProcessor
            .process(&state, &step, Some(&DynamicValue::Null))
            .unwrap();
        assert_eq!(response.new_state, state);
    }

    #[test]
    fn test_output_lands_under_output_key() {
        let step = Step::new("httpRequest", v(json!({"path": "/ping"})));
        let response = DefaultStateProcessor
            .process(&CodableState::empty(), &step, Some(&v(json!({"pong": true}))))
            .unwrap();
        assert_eq!(
            response.new_state.get("httpRequest"),
            Some(&v(json!({"pong": true})))
        );

        let keyed = step.clone().with_output_key("ping");
        let response = DefaultStateProcessor
            .process(&CodableState::empty(), &keyed, Some(&v(json!(1))))
            .unwrap();
        assert_eq!(response.new_state.get("ping"), Some(&v(json!(1))));
        assert!(response.new_state.get("httpRequest").is_none());
    }

    #[test]
    fn test_reducer_is_applied() {
        let step = Step::new("collect", DynamicValue::Null).with_reducer(ReducerType::Append);
        let state = CodableState::empty().with("collect", v(json!(["a"])));
        let response = DefaultStateProcessor
            .process(&state, &step, Some(&v(json!("b"))))
            .unwrap();
        assert_eq!(response.new_state.get("collect"), Some(&v(json!(["a", "b"]))));
    }

    #[test]
    fn test_envelope_replaces_state_and_schedules() {
        let state = CodableState::empty().with("old", v(json!(true)));
        let step = Step::new("httpRequest", DynamicValue::Null);
        let envelope = v(json!({
            "new_state": {"fresh": 1},
            "workflows_to_run": [{"id": "child", "steps": [{"type": "analyticsLog"}]}]
        }));

        let response = DefaultStateProcessor
            .process(&state, &step, Some(&envelope))
            .unwrap();
        assert!(response.new_state.get("old").is_none());
        assert_eq!(response.new_state.get("fresh"), Some(&v(json!(1))));
        assert_eq!(response.workflows_to_run.len(), 1);
        assert_eq!(response.workflows_to_run[0].name(), "child");
    }

    #[test]
    fn test_step_next_comes_before_envelope_workflows() {
        let step = Step::new("httpRequest", DynamicValue::Null)
            .with_next(WorkflowContainer::new(vec![]).with_id("declared"));
        let envelope = v(json!({"workflowsToRun": [{"id": "returned"}]}));

        let response = DefaultStateProcessor
            .process(&CodableState::empty(), &step, Some(&envelope))
            .unwrap();
        let names: Vec<&str> = response.workflows_to_run.iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["declared", "returned"]);
        assert!(response.new_state.is_empty());
    }

    #[test]
    fn test_bad_envelope_is_a_decode_error() {
        let step = Step::new("httpRequest", DynamicValue::Null);
        let envelope = v(json!({"new_state": "not an object"}));
        let err = DefaultStateProcessor
            .process(&CodableState::empty(), &step, Some(&envelope))
            .unwrap_err();
        assert_eq!(err.to_string(), "expected object, got string");
    }

    #[test]
    fn test_processing_is_deterministic() {
        let state = CodableState::empty().with("n", v(json!(1)));
        let step = Step::new("httpRequest", DynamicValue::Null)
            .with_next(WorkflowContainer::new(vec![Step::new("analyticsLog", DynamicValue::Null)]));
        let output = v(json!({"body": [1, 2, 3]}));

        let first = DefaultStateProcessor
            .process(&state, &step, Some(&output))
            .unwrap();
        for _ in 0..10 {
            let again = DefaultStateProcessor
                .process(&state, &step, Some(&output))
                .unwrap();
            assert_eq!(again, first);
        }
    }
}
