// SPDX-License-Identifier: MIT

pub mod condition;
pub mod dispatch;
pub mod engine;
pub mod loader;
pub mod processor;
pub mod registry;
pub mod state;
pub mod types;

pub use engine::{WorkflowEngine, WorkflowEngineBuilder, WorkflowReport, WorkflowStatus};
pub use processor::{DefaultStateProcessor, StateProcessor};
pub use registry::StepResolverRegistry;
pub use state::{CodableState, ReducerType};
pub use types::{StateProcessorResponse, Step, WorkflowContainer, WorkflowPath};
