//! Best-effort prompt enhancement.
//!
//! An enhancer never fails: whatever goes wrong, the caller gets an
//! [`Enhancement::Passthrough`] carrying the original prompt and the reason.
use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::task::CustomizationOptions;

pub mod chat;
pub mod template;

pub use chat::ChatCompletionsEnhancer;
pub use template::PromptTemplate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enhancement {
    Enhanced(String),
    Passthrough { prompt: String, reason: String },
}

impl Enhancement {
    pub fn passthrough(prompt: &str, reason: impl Into<String>) -> Self {
        Enhancement::Passthrough { prompt: prompt.to_string(), reason: reason.into() }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Enhancement::Enhanced(p) => p,
            Enhancement::Passthrough { prompt, .. } => prompt,
        }
    }

    pub fn into_prompt(self) -> String {
        match self {
            Enhancement::Enhanced(p) => p,
            Enhancement::Passthrough { prompt, .. } => prompt,
        }
    }

    pub fn is_enhanced(&self) -> bool {
        matches!(self, Enhancement::Enhanced(_))
    }
}

#[async_trait]
pub trait PromptEnhancer: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn enhance(&self, prompt: &str, options: Option<&CustomizationOptions>) -> Enhancement;
}

/// Enhancer used when no language model is configured.
#[derive(Debug, Clone, Default)]
pub struct PassthroughEnhancer;

#[async_trait]
impl PromptEnhancer for PassthroughEnhancer {
    fn is_configured(&self) -> bool {
        false
    }

    async fn enhance(&self, prompt: &str, _options: Option<&CustomizationOptions>) -> Enhancement {
        Enhancement::passthrough(prompt, "prompt enhancement not configured")
    }
}

pub const SYSTEM_INSTRUCTION: &str = "You are a creative director writing prompts for a text-to-video model. \
Rewrite the idea into one vivid paragraph describing subject, action, setting, camera movement and lighting. \
Honour every listed preference. Keep it under 300 characters. Reply with the prompt only.";

pub const DEFAULT_USER_TEMPLATE: &str = "Idea: {{prompt}}\nPreferences:\n{{attributes}}";

/// Template inputs for one enhancement request.
pub fn template_inputs(prompt: &str, options: Option<&CustomizationOptions>) -> BTreeMap<&'static str, String> {
    let attributes = options
        .map(|o| o.attributes())
        .filter(|a| !a.is_empty())
        .map(|a| {
            a.iter()
                .map(|(k, v)| format!("- {}: {}", k.replace('_', " "), v.trim()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_else(|| "- none".to_string());
    let mut inputs = BTreeMap::new();
    inputs.insert("prompt", prompt.trim().to_string());
    inputs.insert("attributes", attributes);
    inputs
}

pub fn render_user_message(template: &PromptTemplate, prompt: &str, options: Option<&CustomizationOptions>) -> AppResult<String> {
    template.render(&template_inputs(prompt, options))
}
