// SPDX-License-Identifier: MIT

//! Workflow engine
//!
//! Walks a container's steps strictly in order: registry lookup, resolver
//! invocation, state processing, then adopts the new state before the next
//! step starts. Workflows collected along the way are spawned once the step
//! list is exhausted, each starting from the parent's final state.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bdc::config::{EngineConfig, UnknownStepPolicy};
use crate::bdc::workflow::condition;
use crate::bdc::workflow::dispatch::{DetachedJob, Dispatcher};
use crate::bdc::workflow::processor::{DefaultStateProcessor, StateProcessor};
use crate::bdc::workflow::registry::StepResolverRegistry;
use crate::bdc::workflow::state::CodableState;
use crate::bdc::workflow::types::{Step, WorkflowContainer, WorkflowPath};
use crate::sdk::error::{EngineError, EngineErrorKind};
use crate::sdk::resolver::{DispatchMode, ErrorPolicy, StepResolver};
use crate::sdk::value::DynamicValue;

/// Lifecycle of one workflow container execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStatus {
    Idle,
    Running { step_index: usize },
    Spawning { children: usize },
    Completed,
    /// The container's condition was false
    Skipped,
    Failed,
    Cancelled,
}

/// Terminal status of a run that ended in `err`
impl From<&EngineError> for WorkflowStatus {
    fn from(err: &EngineError) -> Self {
        if err.is_cancelled() {
            WorkflowStatus::Cancelled
        } else {
            WorkflowStatus::Failed
        }
    }
}

/// Outcome of a finished workflow and everything it spawned
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowReport {
    pub path: WorkflowPath,
    pub transitions: Vec<WorkflowStatus>,
    pub state: CodableState,
    pub children: Vec<WorkflowReport>,
}

impl WorkflowReport {
    pub fn status(&self) -> &WorkflowStatus {
        self.transitions.last().unwrap_or(&WorkflowStatus::Idle)
    }

    /// Whether the workflow passed through `Spawning`
    pub fn spawned(&self) -> bool {
        self.transitions
            .iter()
            .any(|t| matches!(t, WorkflowStatus::Spawning { .. }))
    }
}

struct EngineInner {
    registry: StepResolverRegistry,
    processor: Arc<dyn StateProcessor>,
    unknown_step_policy: UnknownStepPolicy,
    max_depth: usize,
    cancel: CancellationToken,
    dispatcher: Dispatcher,
}

/// Orchestrates workflow execution. Cheap to clone; clones share the
/// registry, dispatcher and cancellation token.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

pub struct WorkflowEngineBuilder {
    registry: StepResolverRegistry,
    processor: Arc<dyn StateProcessor>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl WorkflowEngineBuilder {
    pub fn config(mut self, config: &EngineConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn unknown_step_policy(mut self, policy: UnknownStepPolicy) -> Self {
        self.config.unknown_step_policy = policy;
        self
    }

    pub fn processor(mut self, processor: Arc<dyn StateProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Share a cancellation token with the host
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn build(self) -> WorkflowEngine {
        WorkflowEngine {
            inner: Arc::new(EngineInner {
                registry: self.registry,
                processor: self.processor,
                unknown_step_policy: self.config.unknown_step_policy,
                max_depth: self.config.max_depth,
                cancel: self.cancel,
                dispatcher: Dispatcher::new(self.config.dispatch_queue_capacity),
            }),
        }
    }
}

impl WorkflowEngine {
    pub fn new(registry: StepResolverRegistry) -> Self {
        Self::builder(registry).build()
    }

    pub fn builder(registry: StepResolverRegistry) -> WorkflowEngineBuilder {
        WorkflowEngineBuilder {
            registry,
            processor: Arc::new(DefaultStateProcessor::new()),
            config: EngineConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &StepResolverRegistry {
        &self.inner.registry
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Stop all in-flight workflows at their next suspension point
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Run a workflow to completion and return its final state
    pub async fn run(
        &self,
        workflow: WorkflowContainer,
        initial_state: CodableState,
    ) -> Result<CodableState, EngineError> {
        Ok(self.run_with_report(workflow, initial_state).await?.state)
    }

    /// Run a workflow and return the full execution tree
    pub async fn run_with_report(
        &self,
        workflow: WorkflowContainer,
        initial_state: CodableState,
    ) -> Result<WorkflowReport, EngineError> {
        let run_id = Uuid::new_v4();
        let path = WorkflowPath::root(workflow.name());
        log::info!("Run {}: starting workflow {}", run_id, path);

        let result = self.clone().execute(workflow, initial_state, path).await;
        match &result {
            Ok(report) => log::info!(
                "Run {}: {} finished {:?}",
                run_id,
                report.path,
                report.status()
            ),
            Err(e) => match WorkflowStatus::from(e) {
                WorkflowStatus::Cancelled => log::warn!("Run {}: {}", run_id, e),
                _ => log::error!("Run {}: {}", run_id, e),
            },
        }
        result
    }

    /// Close the detached queue and wait for queued side effects to be attempted
    pub async fn shutdown(&self) {
        self.inner.dispatcher.shutdown().await;
    }

    fn execute(
        self,
        workflow: WorkflowContainer,
        state: CodableState,
        path: WorkflowPath,
    ) -> BoxFuture<'static, Result<WorkflowReport, EngineError>> {
        async move {
            let mut transitions = vec![WorkflowStatus::Idle];

            if path.depth() > self.inner.max_depth {
                return Err(self.fail(
                    &path,
                    EngineErrorKind::DepthExceeded {
                        limit: self.inner.max_depth,
                    },
                ));
            }
            self.ensure_active(&path)?;

            if let Some(guard) = &workflow.condition {
                match condition::check(guard, &state) {
                    Ok(true) => {}
                    Ok(false) => {
                        log::debug!("{}: condition '{}' is false, skipping", path, guard);
                        transitions.push(WorkflowStatus::Skipped);
                        return Ok(WorkflowReport {
                            path,
                            transitions,
                            state,
                            children: Vec::new(),
                        });
                    }
                    Err(e) => return Err(self.fail(&path, e.into())),
                }
            }

            let mut state = state;
            let mut pending: Vec<WorkflowContainer> = Vec::new();

            for (index, step) in workflow.steps.iter().enumerate() {
                transitions.push(WorkflowStatus::Running { step_index: index });
                let step_path = path.child("step", index);
                log::debug!("{}: resolving '{}'", step_path, step.label());

                let lookup = tokio::select! {
                    biased;
                    _ = self.inner.cancel.cancelled() => {
                        return Err(self.fail(&step_path, EngineErrorKind::Cancelled));
                    }
                    lookup = self.inner.registry.resolver(&step.step_type) => lookup,
                };
                let resolver = match lookup {
                    Ok(resolver) => resolver,
                    Err(miss) => match self.inner.unknown_step_policy {
                        UnknownStepPolicy::Strict => return Err(self.fail(&step_path, miss.into())),
                        UnknownStepPolicy::Lenient => {
                            log::warn!("{}: {}, skipping step", step_path, miss);
                            continue;
                        }
                    },
                };

                let output = self.invoke(resolver, step, &step_path).await?;
                // A swallowed failure must not hide a cancellation that happened meanwhile
                self.ensure_active(&step_path)?;

                let response = self
                    .inner
                    .processor
                    .process(&state, step, output.as_ref())
                    .map_err(|e| self.fail(&step_path, e.into()))?;
                state = response.new_state;
                pending.extend(response.workflows_to_run);
            }

            if pending.is_empty() {
                transitions.push(WorkflowStatus::Completed);
                return Ok(WorkflowReport {
                    path,
                    transitions,
                    state,
                    children: Vec::new(),
                });
            }

            self.ensure_active(&path)?;
            transitions.push(WorkflowStatus::Spawning {
                children: pending.len(),
            });
            log::debug!("{}: spawning {} workflow(s)", path, pending.len());

            let children = self.spawn_children(pending, &state, &path).await?;
            transitions.push(WorkflowStatus::Completed);
            Ok(WorkflowReport {
                path,
                transitions,
                state,
                children,
            })
        }
        .boxed()
    }

    async fn invoke(
        &self,
        resolver: Arc<dyn StepResolver>,
        step: &Step,
        path: &WorkflowPath,
    ) -> Result<Option<DynamicValue>, EngineError> {
        let policy = resolver.error_policy();

        if resolver.dispatch_mode() == DispatchMode::Detached {
            if policy == ErrorPolicy::SwallowAndLog {
                let job = DetachedJob {
                    path: path.clone(),
                    step_type: step.step_type.clone(),
                    resolver,
                    payload: step.payload.clone(),
                };
                tokio::select! {
                    biased;
                    _ = self.inner.cancel.cancelled() => {
                        return Err(self.fail(path, EngineErrorKind::Cancelled));
                    }
                    sent = self.inner.dispatcher.dispatch(job) => {
                        if let Err(e) = sent {
                            log::warn!(
                                "{}: '{}' not dispatched (ignored): {}",
                                path,
                                step.step_type,
                                e
                            );
                        }
                    }
                }
                return Ok(None);
            }
            log::warn!(
                "{}: '{}' asks for detached dispatch but propagates errors; awaiting it",
                path,
                step.step_type
            );
        }

        let result = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => {
                return Err(self.fail(path, EngineErrorKind::Cancelled));
            }
            result = resolver.resolve(step.payload.clone()) => result,
        };

        match (result, policy) {
            (Ok(output), _) => Ok(output),
            (Err(e), ErrorPolicy::SwallowAndLog) => {
                log::warn!("{}: '{}' failed (ignored): {}", path, step.step_type, e);
                Ok(None)
            }
            (Err(e), ErrorPolicy::Propagate) => Err(self.fail(
                path,
                EngineErrorKind::Resolver {
                    step_type: step.step_type.clone(),
                    source: e,
                },
            )),
        }
    }

    async fn spawn_children(
        &self,
        children: Vec<WorkflowContainer>,
        state: &CodableState,
        path: &WorkflowPath,
    ) -> Result<Vec<WorkflowReport>, EngineError> {
        let count = children.len();
        let mut set = JoinSet::new();
        for (index, child) in children.into_iter().enumerate() {
            let child_path = path.child(child.id.as_deref().unwrap_or("spawn"), index);
            let run = self.clone().execute(child, state.clone(), child_path);
            set.spawn(async move { (index, run.await) });
        }

        let mut reports: Vec<Option<WorkflowReport>> = vec![None; count];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(report))) => reports[index] = Some(report),
                Ok((_, Err(e))) => {
                    set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    set.abort_all();
                    return Err(self.fail(path, EngineErrorKind::Task(e.to_string())));
                }
            }
        }

        Ok(reports.into_iter().flatten().collect())
    }

    fn ensure_active(&self, path: &WorkflowPath) -> Result<(), EngineError> {
        if self.inner.cancel.is_cancelled() {
            return Err(self.fail(path, EngineErrorKind::Cancelled));
        }
        Ok(())
    }

    fn fail(&self, path: &WorkflowPath, kind: EngineErrorKind) -> EngineError {
        let err = EngineError::new(path.clone(), kind);
        log::debug!("{}: -> {:?} ({})", path, WorkflowStatus::from(&err), err.kind);
        err
    }
}
