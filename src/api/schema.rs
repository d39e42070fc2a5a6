//! Request and response bodies of the HTTP API.
//!
//! Shared with `videoctl`, which deserializes the same shapes.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::task::{CustomizationOptions, NewTask, Task, TaskStatus};

pub const MAX_PROMPT_CHARS: usize = 500;
pub const MAX_OPTION_CHARS: usize = 200;
pub const DEFAULT_DURATION_SECS: u32 = 5;
pub const DURATION_RANGE: std::ops::RangeInclusive<i64> = 3..=10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateVideoRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_options: Option<CustomizationOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhance_prompt: Option<bool>,
}

impl GenerateVideoRequest {
    /// Check field bounds and turn the request into task fields.
    pub fn validate(self) -> AppResult<NewTask> {
        let prompt_chars = self.prompt.chars().count();
        if self.prompt.trim().is_empty() {
            return Err(AppError::Validation("prompt must not be empty".to_string()));
        }
        if prompt_chars > MAX_PROMPT_CHARS {
            return Err(AppError::Validation(format!(
                "prompt must be at most {} characters (got {})",
                MAX_PROMPT_CHARS, prompt_chars
            )));
        }

        let duration = self.duration.unwrap_or(i64::from(DEFAULT_DURATION_SECS));
        if !DURATION_RANGE.contains(&duration) {
            return Err(AppError::Validation(format!(
                "duration must be between {} and {} seconds",
                DURATION_RANGE.start(),
                DURATION_RANGE.end()
            )));
        }

        let negative_prompt = self.negative_prompt.filter(|n| !n.trim().is_empty());
        if negative_prompt.as_ref().map_or(false, |n| n.chars().count() > MAX_PROMPT_CHARS) {
            return Err(AppError::Validation(format!(
                "negative_prompt must be at most {} characters",
                MAX_PROMPT_CHARS
            )));
        }

        if let Some(options) = &self.customization_options {
            if let Some((name, _)) = options
                .attributes()
                .into_iter()
                .find(|(_, v)| v.chars().count() > MAX_OPTION_CHARS)
            {
                return Err(AppError::Validation(format!(
                    "customization option '{}' must be at most {} characters",
                    name, MAX_OPTION_CHARS
                )));
            }
        }

        Ok(NewTask {
            prompt: self.prompt,
            duration_secs: duration as u32,
            customization: self.customization_options.filter(|o| !o.is_empty()),
            negative_prompt,
            enhance_prompt: self.enhance_prompt.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,
    pub duration: u32,
}

impl From<&Task> for VideoStatusResponse {
    fn from(task: &Task) -> Self {
        VideoStatusResponse {
            task_id: task.id().to_string(),
            status: task.status(),
            progress: task.progress(),
            message: task.message().to_string(),
            video_url: task.result_handle().map(str::to_string),
            error: task.error_detail().map(str::to_string),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
            prompt: task.original_prompt().to_string(),
            enhanced_prompt: task.enhanced_prompt().map(str::to_string),
            duration: task.duration_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub api_configured: bool,
    pub provider: String,
    pub enhancer_configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_reachable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_error: Option<String>,
}
