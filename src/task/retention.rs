//! Optional eviction of finished tasks.
//!
//! Only started when `TASK_TTL_SECS` is configured; otherwise records live as
//! long as the process.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::task::registry::TaskRegistry;

const MAX_SWEEP_EVERY: Duration = Duration::from_secs(60);

/// Spawn a loop that prunes terminal tasks older than `ttl`.
pub fn spawn_pruner(registry: Arc<dyn TaskRegistry>, ttl: Duration) -> JoinHandle<()> {
    let every = ttl.min(MAX_SWEEP_EVERY).max(Duration::from_millis(10));
    tracing::info!("[retention] pruning finished tasks older than {:?} every {:?}", ttl, every);
    tokio::spawn(async move {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            sweep(registry.as_ref(), ttl);
        }
    })
}

/// Run one pruning pass. Returns the number of removed tasks.
pub fn sweep(registry: &dyn TaskRegistry, ttl: Duration) -> usize {
    let Ok(ttl) = chrono::Duration::from_std(ttl) else {
        return 0;
    };
    let removed = registry.prune_terminal(chrono::Utc::now() - ttl);
    if removed > 0 {
        tracing::info!("[retention] pruned {} finished tasks, {} remain", removed, registry.len());
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::model::{NewTask, TaskId};
    use crate::task::registry::InMemoryTaskRegistry;

    fn create(registry: &InMemoryTaskRegistry) -> TaskId {
        registry.create(NewTask {
            prompt: "p".into(),
            duration_secs: 5,
            customization: None,
            negative_prompt: None,
            enhance_prompt: false,
        })
    }

    #[tokio::test]
    async fn pruner_evicts_finished_tasks() {
        let registry = Arc::new(InMemoryTaskRegistry::new());
        let done = create(&registry);
        let running = create(&registry);
        registry.update(&done, &mut |t| { t.fail("boom"); }).unwrap();

        let handle = spawn_pruner(registry.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        assert!(registry.get(&done).is_err());
        assert!(registry.get(&running).is_ok());
    }

    #[test]
    fn sweep_keeps_recent_tasks() {
        let registry = InMemoryTaskRegistry::new();
        let done = create(&registry);
        registry.update(&done, &mut |t| { t.complete("/static/videos/a.mp4"); }).unwrap();
        assert_eq!(sweep(&registry, Duration::from_secs(3600)), 0);
        assert!(registry.get(&done).is_ok());
    }
}
