//! Background dispatch: admission control and panic recovery.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::body::Bytes;
use reqwest::Client;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use video_gen_proxy::artifact::{ArtifactSource, ArtifactStore};
use video_gen_proxy::enhancer::PassthroughEnhancer;
use video_gen_proxy::provider::{JobRef, JobStatus, ShapeParams, Submission, VideoProvider};
use video_gen_proxy::task::{InMemoryTaskRegistry, NewTask, TaskId, TaskRegistry, TaskStatus};
use video_gen_proxy::{AppResult, Dispatcher, Orchestrator};

/// Each submission waits for one permit on `gate`.
struct Gated {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl VideoProvider for Gated {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn submit(&self, prompt: &str, _shape: &ShapeParams) -> AppResult<Submission> {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        Ok(Submission::Ready(JobRef(prompt.to_string())))
    }

    async fn poll_status(&self, _job: &JobRef) -> AppResult<JobStatus> {
        Ok(JobStatus::Succeeded)
    }

    async fn fetch_result(&self, _job: &JobRef) -> AppResult<ArtifactSource> {
        Ok(ArtifactSource::RawBytes(Bytes::from_static(b"clip")))
    }
}

struct Exploding;

#[async_trait]
impl VideoProvider for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    async fn submit(&self, _prompt: &str, _shape: &ShapeParams) -> AppResult<Submission> {
        panic!("renderer crashed");
    }

    async fn poll_status(&self, _job: &JobRef) -> AppResult<JobStatus> {
        Ok(JobStatus::Pending)
    }

    async fn fetch_result(&self, _job: &JobRef) -> AppResult<ArtifactSource> {
        Ok(ArtifactSource::RawBytes(Bytes::new()))
    }
}

fn new_task(prompt: &str) -> NewTask {
    NewTask {
        prompt: prompt.to_string(),
        duration_secs: 5,
        customization: None,
        negative_prompt: None,
        enhance_prompt: false,
    }
}

fn dispatcher(
    registry: Arc<dyn TaskRegistry>,
    provider: Arc<dyn VideoProvider>,
    dir: &TempDir,
    max_concurrent: Option<usize>,
) -> Dispatcher {
    let store = ArtifactStore::new(dir.path(), "/static/videos", Client::new());
    let orchestrator = Orchestrator::new(registry, Arc::new(PassthroughEnhancer), provider, store);
    Dispatcher::new(Arc::new(orchestrator), max_concurrent)
}

async fn wait_for(registry: &dyn TaskRegistry, id: TaskId, wanted: TaskStatus) {
    for _ in 0..300 {
        if registry.get(&id).unwrap().status() == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never reached {}", id, wanted);
}

#[tokio::test]
async fn single_slot_runs_tasks_one_at_a_time() {
    let dir = TempDir::new().unwrap();
    let registry: Arc<dyn TaskRegistry> = Arc::new(InMemoryTaskRegistry::new());
    let gate = Arc::new(Semaphore::new(0));
    let dispatcher = dispatcher(registry.clone(), Arc::new(Gated { gate: gate.clone() }), &dir, Some(1));

    let first = registry.create(new_task("first"));
    let second = registry.create(new_task("second"));
    let first_run = dispatcher.dispatch(first);
    wait_for(registry.as_ref(), first, TaskStatus::Generating).await;
    let second_run = dispatcher.dispatch(second);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let waiting = registry.get(&second).unwrap();
    assert_eq!(waiting.status(), TaskStatus::Queued);
    assert_eq!(waiting.progress(), 0);

    gate.add_permits(1);
    first_run.await.unwrap();
    assert_eq!(registry.get(&first).unwrap().status(), TaskStatus::Completed);

    wait_for(registry.as_ref(), second, TaskStatus::Generating).await;
    gate.add_permits(1);
    second_run.await.unwrap();
    assert_eq!(registry.get(&second).unwrap().status(), TaskStatus::Completed);
}

#[tokio::test]
async fn unlimited_dispatch_runs_tasks_side_by_side() {
    let dir = TempDir::new().unwrap();
    let registry: Arc<dyn TaskRegistry> = Arc::new(InMemoryTaskRegistry::new());
    let gate = Arc::new(Semaphore::new(0));
    let dispatcher = dispatcher(registry.clone(), Arc::new(Gated { gate: gate.clone() }), &dir, None);

    let ids: Vec<TaskId> = (0..3).map(|i| registry.create(new_task(&format!("task {}", i)))).collect();
    let runs: Vec<_> = ids.iter().map(|id| dispatcher.dispatch(*id)).collect();
    for id in &ids {
        wait_for(registry.as_ref(), *id, TaskStatus::Generating).await;
    }

    gate.add_permits(ids.len());
    for run in runs {
        run.await.unwrap();
    }
    for id in &ids {
        assert_eq!(registry.get(id).unwrap().status(), TaskStatus::Completed);
    }
}

#[tokio::test]
async fn panicking_run_marks_task_failed() {
    let dir = TempDir::new().unwrap();
    let registry: Arc<dyn TaskRegistry> = Arc::new(InMemoryTaskRegistry::new());
    let dispatcher = dispatcher(registry.clone(), Arc::new(Exploding), &dir, Some(1));

    let id = registry.create(new_task("boom"));
    dispatcher.dispatch(id).await.unwrap();

    let task = registry.get(&id).unwrap();
    assert_eq!(task.status(), TaskStatus::Failed);
    assert!(task.error_detail().unwrap().contains("aborted unexpectedly"));
    assert!(task.result_handle().is_none());

    // The slot was released despite the panic.
    let next = registry.create(new_task("after"));
    dispatcher.dispatch(next).await.unwrap();
    assert_eq!(registry.get(&next).unwrap().status(), TaskStatus::Failed);
}

#[tokio::test]
async fn zero_cap_still_admits_one_task() {
    let dir = TempDir::new().unwrap();
    let registry: Arc<dyn TaskRegistry> = Arc::new(InMemoryTaskRegistry::new());
    let gate = Arc::new(Semaphore::new(1));
    let dispatcher = dispatcher(registry.clone(), Arc::new(Gated { gate }), &dir, Some(0));

    let id = registry.create(new_task("runs"));
    tokio::time::timeout(Duration::from_secs(5), dispatcher.dispatch(id))
        .await
        .expect("task never started")
        .unwrap();
    assert_eq!(registry.get(&id).unwrap().status(), TaskStatus::Completed);
}
