//! Drives one task from `queued` to a terminal state.
//!
//! Stages run strictly in order: prompt enhancement, generation (submit and
//! poll), then persistence. Every stage error ends in `failed` with the
//! error text as detail; enhancement problems never do.
use std::sync::Arc;
use std::time::Duration;

use crate::artifact::{ArtifactSource, ArtifactStore};
use crate::enhancer::{Enhancement, PromptEnhancer};
use crate::error::AppResult;
use crate::provider::{self, GenerationDefaults, PollPolicy, VideoProvider};
use crate::task::{Task, TaskId, TaskRegistry, TaskStatus};

pub mod dispatcher;

pub use dispatcher::Dispatcher;

pub const PROGRESS_ENHANCING: u8 = 5;
pub const PROGRESS_ENHANCED: u8 = 15;
pub const PROGRESS_GENERATING: u8 = 30;
pub const PROGRESS_POLL_CEILING: u8 = 65;
pub const PROGRESS_DOWNLOADING: u8 = 70;

pub struct Orchestrator {
    registry: Arc<dyn TaskRegistry>,
    enhancer: Arc<dyn PromptEnhancer>,
    provider: Arc<dyn VideoProvider>,
    store: ArtifactStore,
    defaults: GenerationDefaults,
    poll: PollPolicy,
    mirror_remote_results: bool,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        enhancer: Arc<dyn PromptEnhancer>,
        provider: Arc<dyn VideoProvider>,
        store: ArtifactStore,
    ) -> Self {
        Orchestrator {
            registry,
            enhancer,
            provider,
            store,
            defaults: GenerationDefaults::default(),
            poll: PollPolicy::default(),
            mirror_remote_results: false,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_defaults(mut self, defaults: GenerationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Download remote results into the artifact store instead of recording
    /// the provider's URL.
    pub fn mirror_remote_results(mut self, mirror: bool) -> Self {
        self.mirror_remote_results = mirror;
        self
    }

    pub fn registry(&self) -> &Arc<dyn TaskRegistry> {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<dyn VideoProvider> {
        &self.provider
    }

    pub fn enhancer(&self) -> &Arc<dyn PromptEnhancer> {
        &self.enhancer
    }

    /// Run the whole pipeline for `id`. Never returns an error: the outcome
    /// is recorded on the task.
    #[tracing::instrument(name = "orchestrate", skip(self), fields(task_id = %id))]
    pub async fn run(&self, id: TaskId) {
        match self.registry.get(&id) {
            Ok(task) if task.status() == TaskStatus::Queued => {}
            Ok(task) => {
                tracing::warn!(status = %task.status(), "task already started, skipping");
                return;
            }
            Err(e) => {
                tracing::error!("cannot run task: {}", e);
                return;
            }
        }

        match self.drive(id).await {
            Ok(handle) => {
                if self.apply(id, |t| t.complete(handle.as_str())).is_ok() {
                    tracing::info!("task completed: {}", handle);
                }
            }
            Err(e) => {
                tracing::error!("task failed: {}", e);
                self.fail(id, &e.to_string());
            }
        }
    }

    /// Mark `id` as failed unless it already finished.
    pub fn fail(&self, id: TaskId, detail: &str) {
        if let Err(e) = self.apply(id, |t| t.fail(detail)) {
            tracing::error!(task_id = %id, "could not record failure: {}", e);
        }
    }

    async fn drive(&self, id: TaskId) -> AppResult<String> {
        let task = self.apply(id, |t| t.advance(TaskStatus::EnhancingPrompt, PROGRESS_ENHANCING, "Enhancing prompt..."))?;

        let enhancement = if task.enhance_prompt() {
            self.enhancer.enhance(task.original_prompt(), task.customization()).await
        } else {
            Enhancement::passthrough(task.original_prompt(), "enhancement disabled for this request")
        };
        if let Enhancement::Passthrough { reason, .. } = &enhancement {
            tracing::info!("using original prompt: {}", reason);
        }
        let prompt = enhancement.into_prompt();
        self.apply(id, |t| {
            t.set_enhanced_prompt(prompt.as_str()) && t.report_progress(PROGRESS_ENHANCED, "Prompt ready")
        })?;

        let task = self.apply(id, |t| {
            t.advance(TaskStatus::Generating, PROGRESS_GENERATING, "Generating video with AI...")
        })?;
        let shape = self.defaults.shape_for(task.duration_secs(), task.negative_prompt());
        let registry = Arc::clone(&self.registry);
        let budget = self.poll.budget;
        let output = provider::generate(self.provider.as_ref(), task.effective_prompt(), &shape, self.poll, move |elapsed| {
            report_poll_progress(registry.as_ref(), id, elapsed, budget);
        })
        .await?;

        self.apply(id, |t| t.advance(TaskStatus::Downloading, PROGRESS_DOWNLOADING, "Processing video output..."))?;
        let handle = match output {
            ArtifactSource::RemoteUrl(url) if !self.mirror_remote_results => url,
            source => self.store.persist(source, &id).await?,
        };
        Ok(handle)
    }

    // Applies one transition; a rejected transition is logged, not fatal.
    fn apply<F>(&self, id: TaskId, mut transition: F) -> AppResult<Task>
    where
        F: FnMut(&mut Task) -> bool,
    {
        let mut applied = true;
        let task = self.registry.update(&id, &mut |t| applied = transition(t))?;
        if applied {
            tracing::info!(status = %task.status(), progress = task.progress(), "{}", task.message());
        } else {
            tracing::warn!(task_id = %id, status = %task.status(), "transition rejected");
        }
        Ok(task)
    }
}

// Returns whether the update landed; a missing task is logged, not fatal.
fn report_poll_progress(registry: &dyn TaskRegistry, id: TaskId, elapsed: Duration, budget: Duration) -> bool {
    let progress = poll_progress(elapsed, budget);
    let message = format!("Generating video with AI ({}s elapsed)...", elapsed.as_secs());
    match registry.update(&id, &mut |t| {
        t.report_progress(progress, message.as_str());
    }) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(task_id = %id, "progress update dropped: {}", e);
            false
        }
    }
}

/// Progress while waiting on the provider, scaled over the poll budget.
fn poll_progress(elapsed: Duration, budget: Duration) -> u8 {
    let span = f64::from(PROGRESS_POLL_CEILING - PROGRESS_GENERATING);
    let ratio = if budget.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / budget.as_secs_f64()).min(1.0)
    };
    PROGRESS_GENERATING + (span * ratio) as u8
}
