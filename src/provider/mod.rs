//! Generation providers.
//!
//! A [`VideoProvider`] hides one remote backend behind a submit / poll / fetch
//! contract. Backends that block until the video exists answer `submit` with
//! [`Submission::Ready`]; job-queue backends answer with
//! [`Submission::Pending`] and are driven by [`await_job`].
//!
//! - `ltx`: synchronous LTX-Video endpoint (`/generate`, `/video/{file}`).
//! - `runway`: asynchronous task API (`/text_to_video`, `/tasks/{id}`).
//! - `huggingface`: blocking Inference API call (`/models/{model}`).
//! - `mock`: local stand-in used when no provider is configured.
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::artifact::ArtifactSource;
use crate::error::{AppError, AppResult};

pub mod huggingface;
pub mod ltx;
pub mod mock;
pub mod runway;

pub use huggingface::HuggingFaceProvider;
pub use ltx::LtxProvider;
pub use mock::MockProvider;
pub use runway::RunwayProvider;

/// Provider-side handle for one generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef(pub String);

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The result is already available.
    Ready(JobRef),
    /// The job was accepted and must be polled.
    Pending(JobRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed(String),
}

/// Output shape requested from a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeParams {
    pub duration_secs: u32,
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
    pub inference_steps: u32,
    pub guidance_scale: f32,
    pub negative_prompt: Option<String>,
    /// Aspect ratio in `W:H` form, for providers that take a ratio instead of
    /// explicit dimensions.
    pub ratio: String,
}

/// Service-wide generation defaults, filled from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationDefaults {
    pub frame_rate: u32,
    pub inference_steps: u32,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
    pub ratio: String,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        GenerationDefaults {
            frame_rate: 30,
            inference_steps: 50,
            guidance_scale: 4.5,
            width: 704,
            height: 480,
            ratio: "1280:720".to_string(),
        }
    }
}

impl GenerationDefaults {
    pub fn shape_for(&self, duration_secs: u32, negative_prompt: Option<&str>) -> ShapeParams {
        ShapeParams {
            duration_secs,
            frame_count: frames_for_duration(duration_secs, self.frame_rate),
            width: self.width,
            height: self.height,
            inference_steps: self.inference_steps,
            guidance_scale: self.guidance_scale,
            negative_prompt: negative_prompt.map(str::to_string),
            ratio: self.ratio.clone(),
        }
    }
}

/// Frame count for a clip of `duration_secs` at a fixed `fps`.
///
/// Frame-based providers (LTX) consume this value; second-based providers
/// (Runway) ignore it and read `duration_secs`.
pub fn frames_for_duration(duration_secs: u32, fps: u32) -> u32 {
    duration_secs.saturating_mul(fps)
}

/// How often and for how long a pending job is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub budget: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy { interval: Duration::from_secs(3), budget: Duration::from_secs(300) }
    }
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Short lowercase identifier, reported by the health endpoint.
    fn name(&self) -> &'static str;

    /// Whether real credentials/endpoints back this provider.
    fn is_configured(&self) -> bool {
        true
    }

    async fn submit(&self, prompt: &str, shape: &ShapeParams) -> AppResult<Submission>;

    async fn poll_status(&self, job: &JobRef) -> AppResult<JobStatus>;

    async fn fetch_result(&self, job: &JobRef) -> AppResult<ArtifactSource>;

    /// Live reachability check. Providers without a cheap check report `Ok`.
    async fn check_health(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Poll `job` until it finishes or `policy.budget` runs out.
///
/// `on_pending` is called with the elapsed time after every poll that still
/// reports the job as pending. The final sleep is shortened to the remaining
/// budget and each status request is cut off at the same deadline, so a
/// timeout surfaces no later than budget + one interval.
pub async fn await_job<F>(
    provider: &dyn VideoProvider,
    job: &JobRef,
    policy: PollPolicy,
    mut on_pending: F,
) -> AppResult<()>
where
    F: FnMut(Duration) + Send,
{
    let started = Instant::now();
    let timed_out = || AppError::ProviderTimeout {
        job: job.to_string(),
        budget_secs: policy.budget.as_secs_f64(),
    };
    loop {
        // A stalled status request must not outlive budget + one interval.
        let allowance = policy.budget.saturating_sub(started.elapsed()) + policy.interval;
        let status = tokio::time::timeout(allowance, provider.poll_status(job))
            .await
            .map_err(|_| timed_out())??;
        match status {
            JobStatus::Succeeded => return Ok(()),
            JobStatus::Failed(cause) => return Err(AppError::ProviderJobFailed(cause)),
            JobStatus::Pending => {}
        }
        let elapsed = started.elapsed();
        if elapsed >= policy.budget {
            return Err(timed_out());
        }
        on_pending(elapsed);
        tracing::debug!(provider = provider.name(), job = %job, "job pending after {:?}", elapsed);
        tokio::time::sleep(policy.interval.min(policy.budget - elapsed)).await;
    }
}

/// Submit, wait if needed, and fetch the output of one generation.
pub async fn generate<F>(
    provider: &dyn VideoProvider,
    prompt: &str,
    shape: &ShapeParams,
    policy: PollPolicy,
    on_pending: F,
) -> AppResult<ArtifactSource>
where
    F: FnMut(Duration) + Send,
{
    let job = match provider.submit(prompt, shape).await? {
        Submission::Ready(job) => job,
        Submission::Pending(job) => {
            tracing::info!(provider = provider.name(), job = %job, "job submitted, polling");
            await_job(provider, &job, policy, on_pending).await?;
            job
        }
    };
    provider.fetch_result(&job).await
}
