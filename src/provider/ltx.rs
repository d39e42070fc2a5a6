//! Thin HTTP client for an LTX-Video generation endpoint.
//!
//! - `submit` posts to `/generate`, which blocks until the clip is rendered
//!   and answers with the output filename.
//! - `fetch_result` streams `/video/{filename}`.
//! - `check_health` calls `/health`.
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactSource;
use crate::error::{AppError, AppResult};
use crate::provider::{JobRef, JobStatus, ShapeParams, Submission, VideoProvider};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    num_inference_steps: u32,
    guidance_scale: f32,
    num_frames: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    video_filename: Option<String>,
    #[serde(default)]
    generation_time: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct LtxProvider {
    client: Client,
    base_url: String,
}

impl LtxProvider {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        LtxProvider { client, base_url: base }
    }

    /// `{base}/video/{filename}`, with the filename encoded as one path segment.
    fn video_url(&self, filename: &str) -> AppResult<Url> {
        if filename.is_empty() || filename == "." || filename == ".." {
            return Err(AppError::Provider(format!("LTX returned an invalid video filename '{}'", filename)));
        }
        let invalid_base = || AppError::Provider(format!("invalid LTX base URL '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid_base())?;
        url.path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .push("video")
            .push(filename);
        Ok(url)
    }

    async fn failure(context: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| "Unable to read error body".to_string());
        let message = format!("{}. Status: {}, Body: {}", context, status, body);
        tracing::error!("{}", message);
        AppError::Provider(message)
    }
}

#[async_trait]
impl VideoProvider for LtxProvider {
    fn name(&self) -> &'static str {
        "ltx"
    }

    async fn submit(&self, prompt: &str, shape: &ShapeParams) -> AppResult<Submission> {
        let url = format!("{}/generate", self.base_url);
        let request = GenerateRequest {
            prompt,
            negative_prompt: shape.negative_prompt.as_deref().unwrap_or(""),
            num_inference_steps: shape.inference_steps,
            guidance_scale: shape.guidance_scale,
            num_frames: shape.frame_count,
            width: shape.width,
            height: shape.height,
        };
        tracing::info!("Sending generation request to LTX at URL: {}", url);
        tracing::debug!(frames = shape.frame_count, "LTX prompt: {}", prompt);

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(Self::failure("Failed to generate video", response).await);
        }

        let body: GenerateResponse = response.json().await?;
        match body {
            GenerateResponse { success: true, video_filename: Some(filename), generation_time, .. } => {
                tracing::info!("LTX rendered {} in {:.1}s", filename, generation_time.unwrap_or_default());
                Ok(Submission::Ready(JobRef(filename)))
            }
            GenerateResponse { error, message, .. } => Err(AppError::ProviderJobFailed(
                error.or(message).unwrap_or_else(|| "no video filename returned".to_string()),
            )),
        }
    }

    async fn poll_status(&self, _job: &JobRef) -> AppResult<JobStatus> {
        // Filenames are only handed out for finished renders.
        Ok(JobStatus::Succeeded)
    }

    async fn fetch_result(&self, job: &JobRef) -> AppResult<ArtifactSource> {
        let url = self.video_url(&job.0)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::failure("Failed to download video", response).await);
        }
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(ArtifactSource::Stream(Box::pin(stream)))
    }

    async fn check_health(&self) -> AppResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Provider(format!("LTX health check failed: {:?}", response.status())))
        }
    }
}
