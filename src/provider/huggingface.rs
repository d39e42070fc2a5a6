//! Hugging Face Inference text-to-video.
//!
//! `POST {base}/models/{model}` blocks until the clip exists. The answer is
//! either the raw video body or JSON carrying a hosted `url` (or an `error`).
//! The output is held here between `submit` and `fetch_result`.
use async_trait::async_trait;
use dashmap::DashMap;
use hyper::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::ArtifactSource;
use crate::error::{AppError, AppResult};
use crate::provider::{JobRef, JobStatus, ShapeParams, Submission, VideoProvider};

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
}

#[derive(Serialize)]
struct InferenceParameters<'a> {
    num_frames: u32,
    num_inference_steps: u32,
    guidance_scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct InferenceReply {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    video: Option<InferenceVideo>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InferenceVideo {
    url: String,
}

enum Output {
    Bytes(Bytes),
    Url(String),
}

pub struct HuggingFaceProvider {
    client: Client,
    base_url: String,
    token: String,
    model: String,
    outputs: DashMap<String, Output>,
}

impl HuggingFaceProvider {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, model: impl Into<String>, client: Client) -> Self {
        HuggingFaceProvider {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            model: model.into(),
            outputs: DashMap::new(),
        }
    }

    /// `{base}/models/{org}/{name}`; each part of the model id is its own segment.
    fn model_url(&self) -> AppResult<Url> {
        let invalid_base = || AppError::Provider(format!("invalid Hugging Face base URL '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid_base())?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| invalid_base())?;
            segments.pop_if_empty().push("models");
            for part in self.model.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
        }
        Ok(url)
    }

    fn read_reply(body: &[u8]) -> AppResult<Output> {
        let reply: InferenceReply = serde_json::from_slice(body)?;
        if let Some(error) = reply.error {
            return Err(AppError::Provider(format!("Hugging Face inference error: {}", error)));
        }
        reply
            .url
            .or_else(|| reply.video.map(|v| v.url))
            .map(Output::Url)
            .ok_or_else(|| AppError::Provider("Hugging Face returned JSON without a video".to_string()))
    }
}

#[async_trait]
impl VideoProvider for HuggingFaceProvider {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    #[tracing::instrument(name = "hf_submit", skip_all, fields(model = %self.model))]
    async fn submit(&self, prompt: &str, shape: &ShapeParams) -> AppResult<Submission> {
        let request = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                num_frames: shape.frame_count,
                num_inference_steps: shape.inference_steps,
                guidance_scale: shape.guidance_scale,
                negative_prompt: shape.negative_prompt.as_deref(),
            },
        };
        let response = self
            .client
            .post(self.model_url()?)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.starts_with("application/json"));
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = format!(
                "Video generation failed: {} - {}",
                status,
                String::from_utf8_lossy(&body)
            );
            tracing::error!("{}", message);
            return Err(AppError::Provider(message));
        }

        let output = if is_json {
            Self::read_reply(&body)?
        } else if body.is_empty() {
            return Err(AppError::Provider("Hugging Face returned an empty video".to_string()));
        } else {
            Output::Bytes(body)
        };
        let job = Uuid::new_v4().to_string();
        self.outputs.insert(job.clone(), output);
        Ok(Submission::Ready(JobRef(job)))
    }

    async fn poll_status(&self, job: &JobRef) -> AppResult<JobStatus> {
        if self.outputs.contains_key(&job.0) {
            Ok(JobStatus::Succeeded)
        } else {
            Ok(JobStatus::Failed(format!("unknown Hugging Face job {}", job)))
        }
    }

    async fn fetch_result(&self, job: &JobRef) -> AppResult<ArtifactSource> {
        match self.outputs.remove(&job.0) {
            Some((_, Output::Bytes(bytes))) => Ok(ArtifactSource::RawBytes(bytes)),
            Some((_, Output::Url(url))) => Ok(ArtifactSource::RemoteUrl(url)),
            None => Err(AppError::Provider(format!("no output held for Hugging Face job {}", job))),
        }
    }
}
