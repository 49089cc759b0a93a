// SPDX-License-Identifier: MIT

//! Typed error handling for the BDC engine
//!
//! Each layer owns a small error enum; `EngineError` is the umbrella surfaced
//! by `WorkflowEngine::run`, and `BdcError` covers configuration and loading.

use thiserror::Error;

use crate::bdc::workflow::types::WorkflowPath;

/// A dynamic value could not be projected into the shape a consumer expected
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The value had a different JSON type than expected
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A required field was absent from an object
    #[error("missing field '{0}'")]
    MissingField(String),

    /// Structured decoding through serde failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The value had the right type but an unusable content
    #[error("invalid value: {0}")]
    Invalid(String),
}

impl DecodeError {
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }
}

/// Registry lookup failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no resolver registered for step type '{step_type}'")]
    UnknownStepType { step_type: String },
}

impl RegistryError {
    pub fn unknown(step_type: impl Into<String>) -> Self {
        Self::UnknownStepType {
            step_type: step_type.into(),
        }
    }
}

/// Errors raised by the transport collaborator
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request description could not be turned into a real request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network level failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors raised by an analytics sink
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics sink error: {0}")]
    Sink(String),

    #[error("analytics upload failed: {0}")]
    Transport(#[from] TransportError),

    #[error("analytics event encoding failed: {0}")]
    Encode(#[from] DecodeError),
}

/// Failure of a single step resolver invocation
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("payload decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("{0}")]
    Failed(String),
}

impl ResolverError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Guard expression failures
#[derive(Debug, Error, PartialEq)]
pub enum ConditionError {
    #[error("could not parse condition '{input}': {reason}")]
    Parse { input: String, reason: String },
}

/// Reason a workflow execution failed
#[derive(Debug, Error)]
pub enum EngineErrorKind {
    #[error(transparent)]
    UnknownStepType(#[from] RegistryError),

    #[error("step '{step_type}' failed: {source}")]
    Resolver {
        step_type: String,
        #[source]
        source: ResolverError,
    },

    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// The state processor rejected a resolver output
    #[error("state processing failed: {0}")]
    Processor(#[from] DecodeError),

    #[error("workflow cancelled")]
    Cancelled,

    #[error("workflow nesting exceeded the limit of {limit}")]
    DepthExceeded { limit: usize },

    /// A spawned child workflow task panicked or was aborted
    #[error("workflow task failed: {0}")]
    Task(String),
}

/// Umbrella error returned by the engine, tagged with the failing workflow path
#[derive(Debug, Error)]
#[error("workflow {path}: {kind}")]
pub struct EngineError {
    pub path: WorkflowPath,
    #[source]
    pub kind: EngineErrorKind,
}

impl EngineError {
    pub fn new(path: WorkflowPath, kind: impl Into<EngineErrorKind>) -> Self {
        Self {
            path,
            kind: kind.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, EngineErrorKind::Cancelled)
    }
}

/// Top-level error for configuration, loading and the CLI
#[derive(Debug, Error)]
pub enum BdcError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported workflow document: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl BdcError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_message() {
        let err = DecodeError::mismatch("object", "string");
        assert_eq!(err.to_string(), "expected object, got string");
    }

    #[test]
    fn test_unknown_step_type_message() {
        let err = RegistryError::unknown("scanCard");
        assert_eq!(
            err.to_string(),
            "no resolver registered for step type 'scanCard'"
        );
    }

    #[test]
    fn test_engine_error_carries_path() {
        let path = WorkflowPath::root("checkout").child("next", 0);
        let err = EngineError::new(
            path,
            EngineErrorKind::Resolver {
                step_type: "httpRequest".to_string(),
                source: ResolverError::failed("boom"),
            },
        );
        assert_eq!(
            err.to_string(),
            "workflow checkout/next[0]: step 'httpRequest' failed: boom"
        );
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_detection() {
        let err = EngineError::new(WorkflowPath::root("w"), EngineErrorKind::Cancelled);
        assert!(err.is_cancelled());
    }
}
