// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ResolverError;
use super::value::DynamicValue;

/// What happens to a resolver failure.
///
/// Every resolver declares this itself; the engine never decides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Surface the failure and fail the owning workflow
    Propagate,
    /// Log the failure and continue as if the step produced no output
    SwallowAndLog,
}

/// How the engine waits on a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Await the resolver and feed its output to the state processor
    #[default]
    Await,
    /// Queue the invocation on the background dispatcher and continue
    /// immediately with no output. Only honoured for `SwallowAndLog`
    /// resolvers.
    Detached,
}

/// Handler for one step type.
///
/// # Implementation Notes
/// - `schema()` documents the payload the resolver accepts; store it in a
///   static so it is not rebuilt on every call
/// - `error_policy()` has no default: every resolver must pick one
#[async_trait]
pub trait StepResolver: Send + Sync {
    /// JSON schema of the payload this resolver understands
    fn schema(&self) -> &DynamicValue;

    fn error_policy(&self) -> ErrorPolicy;

    fn dispatch_mode(&self) -> DispatchMode {
        DispatchMode::Await
    }

    /// Perform the step's side effect and optionally return an output value
    async fn resolve(&self, payload: DynamicValue) -> Result<Option<DynamicValue>, ResolverError>;
}
