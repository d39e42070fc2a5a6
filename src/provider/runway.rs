//! Client for Runway's asynchronous task API.
//!
//! Submission returns a task id at once; the id is then polled through
//! `/tasks/{id}` until the task reports `SUCCEEDED` or `FAILED`. Finished
//! tasks expose hosted output URLs, which are returned as remote results.
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::ArtifactSource;
use crate::error::{AppError, AppResult};
use crate::provider::{JobRef, JobStatus, ShapeParams, Submission, VideoProvider};

const API_VERSION: &str = "2024-11-06";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextToVideoRequest<'a> {
    prompt_text: &'a str,
    model: &'a str,
    duration: u32,
    ratio: &'a str,
}

#[derive(Deserialize)]
struct CreatedTask {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskState {
    status: String,
    #[serde(default)]
    output: Option<Vec<String>>,
    #[serde(default)]
    failure: Option<Value>,
}

impl TaskState {
    fn job_status(&self) -> JobStatus {
        match self.status.to_ascii_uppercase().as_str() {
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" | "CANCELLED" => JobStatus::Failed(self.failure_message()),
            _ => JobStatus::Pending,
        }
    }

    // `failure` is either a bare string or `{ "message": ... }`.
    fn failure_message(&self) -> String {
        match &self.failure {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string()),
            None => "Unknown error".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct RunwayProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl RunwayProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, client: Client) -> Self {
        RunwayProvider {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_key).header("X-Runway-Version", API_VERSION)
    }

    async fn task_state(&self, job: &JobRef) -> AppResult<TaskState> {
        let url = format!("{}/tasks/{}", self.base_url, job);
        let response = self.authorized(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider(format!("Status check failed: {} - {}", status, body)));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VideoProvider for RunwayProvider {
    fn name(&self) -> &'static str {
        "runway"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn submit(&self, prompt: &str, shape: &ShapeParams) -> AppResult<Submission> {
        let url = format!("{}/text_to_video", self.base_url);
        let request = TextToVideoRequest {
            prompt_text: prompt,
            model: &self.model,
            duration: shape.duration_secs,
            ratio: &shape.ratio,
        };
        let response = self.authorized(self.client.post(&url)).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = format!("Video generation API error: {} - {}", status, body);
            tracing::error!("{}", message);
            return Err(AppError::Provider(message));
        }
        let created: CreatedTask = response.json().await?;
        Ok(Submission::Pending(JobRef(created.id)))
    }

    async fn poll_status(&self, job: &JobRef) -> AppResult<JobStatus> {
        Ok(self.task_state(job).await?.job_status())
    }

    async fn fetch_result(&self, job: &JobRef) -> AppResult<ArtifactSource> {
        let state = self.task_state(job).await?;
        state
            .output
            .and_then(|urls| urls.into_iter().next())
            .map(ArtifactSource::RemoteUrl)
            .ok_or_else(|| AppError::Provider(format!("Task {} finished without output", job)))
    }
}
