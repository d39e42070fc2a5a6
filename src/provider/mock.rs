//! Stand-in provider for running the service without generation credentials.
//!
//! Simulates render latency and yields a small placeholder payload so the
//! whole pipeline, including the artifact store, can be exercised locally.
use std::time::Duration;

use async_trait::async_trait;
use hyper::body::Bytes;
use uuid::Uuid;

use crate::artifact::ArtifactSource;
use crate::error::AppResult;
use crate::provider::{JobRef, JobStatus, ShapeParams, Submission, VideoProvider};

const PLACEHOLDER: &[u8] = b"mock video: no generation provider configured\n";

#[derive(Debug, Clone)]
pub struct MockProvider {
    delay: Duration,
}

impl MockProvider {
    pub fn new(delay: Duration) -> Self {
        MockProvider { delay }
    }
}

#[async_trait]
impl VideoProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn submit(&self, prompt: &str, shape: &ShapeParams) -> AppResult<Submission> {
        tracing::info!("Generating video (mock mode), {} frames: {}", shape.frame_count, prompt);
        tokio::time::sleep(self.delay).await;
        Ok(Submission::Ready(JobRef(format!("mock-{}", Uuid::new_v4()))))
    }

    async fn poll_status(&self, _job: &JobRef) -> AppResult<JobStatus> {
        Ok(JobStatus::Succeeded)
    }

    async fn fetch_result(&self, _job: &JobRef) -> AppResult<ArtifactSource> {
        Ok(ArtifactSource::RawBytes(Bytes::from_static(PLACEHOLDER)))
    }
}
