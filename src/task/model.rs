//! Task record and its lifecycle rules.
//!
//! A [`Task`] only changes through its transition methods, which keep the
//! record consistent: status moves forward, progress never drops, and the
//! result handle and error detail are mutually exclusive terminal fields.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(TaskId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    EnhancingPrompt,
    Generating,
    Downloading,
    Completed,
    Failed,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Queued => 0,
            TaskStatus::EnhancingPrompt => 1,
            TaskStatus::Generating => 2,
            TaskStatus::Downloading => 3,
            TaskStatus::Completed | TaskStatus::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::EnhancingPrompt => "enhancing_prompt",
            TaskStatus::Generating => "generating",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look-and-feel attributes forwarded to the prompt enhancer.
///
/// Unknown keys sent by clients land in `extra` and are passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomizationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_palette: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, String>,
}

impl CustomizationOptions {
    /// Non-empty attributes as `(name, value)` pairs, named fields first.
    pub fn attributes(&self) -> Vec<(&str, &str)> {
        let named = [
            ("style", &self.style),
            ("camera", &self.camera),
            ("lighting", &self.lighting),
            ("mood", &self.mood),
            ("color_palette", &self.color_palette),
            ("pacing", &self.pacing),
        ];
        named
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes().is_empty()
    }
}

/// Fields supplied by the gateway when a task is created.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub prompt: String,
    pub duration_secs: u32,
    pub customization: Option<CustomizationOptions>,
    pub negative_prompt: Option<String>,
    pub enhance_prompt: bool,
}

#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    status: TaskStatus,
    progress: u8,
    original_prompt: String,
    enhanced_prompt: Option<String>,
    customization: Option<CustomizationOptions>,
    negative_prompt: Option<String>,
    enhance_prompt: bool,
    duration_secs: u32,
    result_handle: Option<String>,
    error_detail: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    message: String,
}

impl Task {
    pub fn new(id: TaskId, fields: NewTask) -> Self {
        let now = Utc::now();
        Task {
            id,
            status: TaskStatus::Queued,
            progress: 0,
            original_prompt: fields.prompt,
            enhanced_prompt: None,
            customization: fields.customization,
            negative_prompt: fields.negative_prompt,
            enhance_prompt: fields.enhance_prompt,
            duration_secs: fields.duration_secs,
            result_handle: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
            message: "Video generation queued".to_string(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn original_prompt(&self) -> &str {
        &self.original_prompt
    }

    pub fn enhanced_prompt(&self) -> Option<&str> {
        self.enhanced_prompt.as_deref()
    }

    /// The prompt the provider should receive.
    pub fn effective_prompt(&self) -> &str {
        self.enhanced_prompt.as_deref().unwrap_or(&self.original_prompt)
    }

    pub fn customization(&self) -> Option<&CustomizationOptions> {
        self.customization.as_ref()
    }

    pub fn negative_prompt(&self) -> Option<&str> {
        self.negative_prompt.as_deref()
    }

    pub fn enhance_prompt(&self) -> bool {
        self.enhance_prompt
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn result_handle(&self) -> Option<&str> {
        self.result_handle.as_deref()
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Move to a later non-terminal status.
    ///
    /// Returns `false` and leaves the record untouched when the move would go
    /// backwards, target a terminal status, or start from a terminal one.
    pub fn advance(&mut self, status: TaskStatus, progress: u8, message: impl Into<String>) -> bool {
        if self.status.is_terminal() || status.is_terminal() || status.rank() < self.status.rank() {
            return false;
        }
        self.status = status;
        self.bump_progress(progress);
        self.message = message.into();
        self.touch();
        true
    }

    /// Update progress and narration without changing status.
    pub fn report_progress(&mut self, progress: u8, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.bump_progress(progress);
        self.message = message.into();
        self.touch();
        true
    }

    /// Record the prompt chosen by the enhancement stage. Set at most once.
    pub fn set_enhanced_prompt(&mut self, prompt: impl Into<String>) -> bool {
        if self.status != TaskStatus::EnhancingPrompt || self.enhanced_prompt.is_some() {
            return false;
        }
        self.enhanced_prompt = Some(prompt.into());
        self.touch();
        true
    }

    pub fn complete(&mut self, handle: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.result_handle = Some(handle.into());
        self.message = "Video generated successfully".to_string();
        self.touch();
        true
    }

    pub fn fail(&mut self, detail: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let detail = detail.into();
        self.status = TaskStatus::Failed;
        self.message = format!("Generation failed: {}", detail);
        self.error_detail = Some(detail);
        self.touch();
        true
    }

    // Only completion may reach 100.
    fn bump_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(99));
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
