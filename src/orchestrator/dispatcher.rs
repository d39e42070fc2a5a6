//! Hands orchestrations to the tokio runtime.
//!
//! `dispatch` returns immediately; the gateway never waits on the spawned
//! run. With a concurrency limit, runs beyond the limit wait for a permit and
//! their tasks stay `queued` meanwhile.
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::orchestrator::Orchestrator;
use crate::task::TaskId;

#[derive(Clone)]
pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
    permits: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    /// `max_concurrent` is clamped to what a semaphore can hold, and never 0.
    pub fn new(orchestrator: Arc<Orchestrator>, max_concurrent: Option<usize>) -> Self {
        Dispatcher {
            orchestrator,
            permits: max_concurrent.map(|n| Arc::new(Semaphore::new(n.clamp(1, Semaphore::MAX_PERMITS)))),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn dispatch(&self, id: TaskId) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = match permits {
                Some(permits) => match permits.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        orchestrator.fail(id, "dispatcher shut down before the task could start");
                        return;
                    }
                },
                None => None,
            };
            if AssertUnwindSafe(orchestrator.run(id)).catch_unwind().await.is_err() {
                tracing::error!(task_id = %id, "orchestration panicked");
                orchestrator.fail(id, "internal error: orchestration aborted unexpectedly");
            }
        })
    }
}
