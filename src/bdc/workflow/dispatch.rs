// SPDX-License-Identifier: MIT

//! Background dispatcher for fire-and-forget resolvers
//!
//! A detached step is considered handled once its job is accepted. Jobs go
//! through a bounded queue drained in order by a single worker; when the
//! queue is full the job runs on its own tracked task instead, so a slow
//! collaborator never makes the caller wait. `shutdown` closes the queue and
//! waits until every accepted job has been attempted.

use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::bdc::workflow::types::WorkflowPath;
use crate::sdk::resolver::StepResolver;
use crate::sdk::value::DynamicValue;

/// One queued resolver invocation
pub struct DetachedJob {
    pub path: WorkflowPath,
    pub step_type: String,
    pub resolver: Arc<dyn StepResolver>,
    pub payload: DynamicValue,
}

enum DispatcherState {
    Idle,
    Running {
        sender: mpsc::Sender<DetachedJob>,
        worker: JoinHandle<()>,
    },
    Closed,
}

/// Bounded queue plus worker, started lazily on the first job
pub struct Dispatcher {
    capacity: usize,
    state: Mutex<DispatcherState>,
    overflow: TaskTracker,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(DispatcherState::Idle),
            overflow: TaskTracker::new(),
        }
    }

    /// Accept a job without waiting for queue capacity
    pub async fn dispatch(&self, job: DetachedJob) -> Result<(), String> {
        let mut state = self.state.lock().await;
        if matches!(*state, DispatcherState::Idle) {
            let (sender, receiver) = mpsc::channel(self.capacity);
            let worker = tokio::spawn(drain(receiver));
            *state = DispatcherState::Running { sender, worker };
            log::debug!("Started detached dispatcher (capacity {})", self.capacity);
        }

        let sender = match &*state {
            DispatcherState::Running { sender, .. } => sender,
            _ => {
                return Err(format!(
                    "dispatcher has been shut down, dropped step '{}'",
                    job.step_type
                ))
            }
        };

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                log::debug!("{}: detached queue full, running '{}' aside", job.path, job.step_type);
                self.overflow.spawn(run(job));
                Ok(())
            }
            Err(TrySendError::Closed(job)) => Err(format!(
                "dispatcher queue closed, dropped step '{}'",
                job.step_type
            )),
        }
    }

    /// Close the queue and wait for every accepted job to be attempted
    pub async fn shutdown(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, DispatcherState::Closed)
        };

        if let DispatcherState::Running { sender, worker } = previous {
            drop(sender);
            if let Err(e) = worker.await {
                log::error!("Detached dispatcher worker failed: {}", e);
            }
        }
        self.overflow.close();
        self.overflow.wait().await;
        log::debug!("Detached dispatcher flushed");
    }
}

async fn drain(mut receiver: mpsc::Receiver<DetachedJob>) {
    while let Some(job) = receiver.recv().await {
        run(job).await;
    }
}

async fn run(job: DetachedJob) {
    match job.resolver.resolve(job.payload).await {
        Ok(_) => log::debug!("Detached step '{}' at {} done", job.step_type, job.path),
        Err(e) => log::warn!(
            "Detached step '{}' at {} failed (ignored): {}",
            job.step_type,
            job.path,
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::error::ResolverError;
    use crate::sdk::resolver::ErrorPolicy;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    static NO_SCHEMA: DynamicValue = DynamicValue::Null;

    struct Recorder {
        seen: Arc<StdMutex<Vec<DynamicValue>>>,
        fail: bool,
    }

    #[async_trait]
    impl StepResolver for Recorder {
        fn schema(&self) -> &DynamicValue {
            &NO_SCHEMA
        }

        fn error_policy(&self) -> ErrorPolicy {
            ErrorPolicy::SwallowAndLog
        }

        async fn resolve(
            &self,
            payload: DynamicValue,
        ) -> Result<Option<DynamicValue>, ResolverError> {
            self.seen.lock().unwrap().push(payload);
            if self.fail {
                return Err(ResolverError::failed("sink offline"));
            }
            Ok(None)
        }
    }

    fn job(resolver: Arc<dyn StepResolver>, n: i64) -> DetachedJob {
        DetachedJob {
            path: WorkflowPath::root("test"),
            step_type: "analyticsLog".to_string(),
            resolver,
            payload: DynamicValue::from(n),
        }
    }

    #[tokio::test]
    async fn test_shutdown_flushes_in_order() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let resolver: Arc<dyn StepResolver> = Arc::new(Recorder {
            seen: seen.clone(),
            fail: false,
        });
        let dispatcher = Dispatcher::new(8);

        for n in 0..5 {
            dispatcher.dispatch(job(resolver.clone(), n)).await.unwrap();
        }
        dispatcher.shutdown().await;

        let seen = seen.lock().unwrap();
        let values: Vec<i64> = seen.iter().map(|v| v.as_i64().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_worker() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let resolver: Arc<dyn StepResolver> = Arc::new(Recorder {
            seen: seen.clone(),
            fail: true,
        });
        let dispatcher = Dispatcher::new(8);

        dispatcher.dispatch(job(resolver.clone(), 1)).await.unwrap();
        dispatcher.dispatch(job(resolver, 2)).await.unwrap();
        dispatcher.shutdown().await;

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_is_rejected() {
        let resolver: Arc<dyn StepResolver> = Arc::new(Recorder {
            seen: Arc::new(StdMutex::new(Vec::new())),
            fail: false,
        });
        let dispatcher = Dispatcher::new(1);
        dispatcher.shutdown().await;

        let err = dispatcher.dispatch(job(resolver, 1)).await.unwrap_err();
        assert!(err.contains("shut down"));
    }

    /// Blocks every call until the gate gets a permit
    struct Gated {
        gate: Arc<tokio::sync::Semaphore>,
        seen: Arc<StdMutex<Vec<DynamicValue>>>,
    }

    #[async_trait]
    impl StepResolver for Gated {
        fn schema(&self) -> &DynamicValue {
            &NO_SCHEMA
        }

        fn error_policy(&self) -> ErrorPolicy {
            ErrorPolicy::SwallowAndLog
        }

        async fn resolve(
            &self,
            payload: DynamicValue,
        ) -> Result<Option<DynamicValue>, ResolverError> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ResolverError::failed(e.to_string()))?;
            self.seen.lock().unwrap().push(payload);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block_the_caller() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let resolver: Arc<dyn StepResolver> = Arc::new(Gated {
            gate: gate.clone(),
            seen: seen.clone(),
        });
        let dispatcher = Dispatcher::new(1);

        let accepted = tokio::time::timeout(Duration::from_secs(2), async {
            for n in 0..4 {
                dispatcher.dispatch(job(resolver.clone(), n)).await.unwrap();
            }
        })
        .await;
        assert!(accepted.is_ok());
        assert!(seen.lock().unwrap().is_empty());

        gate.add_permits(4);
        dispatcher.shutdown().await;

        let mut values: Vec<i64> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect();
        values.sort();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }
}
