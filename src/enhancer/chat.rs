//! Prompt enhancement through an OpenAI-compatible `/chat/completions` API.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::enhancer::{render_user_message, Enhancement, PromptEnhancer, PromptTemplate, SYSTEM_INSTRUCTION};
use crate::error::{AppError, AppResult};
use crate::task::CustomizationOptions;

#[derive(Serialize, Deserialize, Clone, Debug)]
struct Message {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

pub struct ChatCompletionsEnhancer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    template: PromptTemplate,
}

impl ChatCompletionsEnhancer {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        template: PromptTemplate,
        client: Client,
    ) -> Self {
        ChatCompletionsEnhancer {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            template,
        }
    }

    async fn try_enhance(&self, prompt: &str, options: Option<&CustomizationOptions>) -> AppResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Enhancer("no API key configured".to_string()))?;
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system".into(), content: Some(SYSTEM_INSTRUCTION.to_string()) },
                Message { role: "user".into(), content: Some(render_user_message(&self.template, prompt, options)?) },
            ],
            temperature: 0.7,
            max_tokens: 200,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self.client.post(&url).bearer_auth(api_key).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Enhancer(format!("chat completion failed ({}): {}", status, body)));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| clean_completion(&c))
            .unwrap_or_default();
        if content.is_empty() {
            return Err(AppError::Enhancer("empty completion".to_string()));
        }
        Ok(content)
    }
}

// Models like to wrap the answer in quotes or prefix it.
fn clean_completion(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("Prompt:")
        .map(str::trim_start)
        .unwrap_or(trimmed);
    trimmed.trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}

#[async_trait]
impl PromptEnhancer for ChatCompletionsEnhancer {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn enhance(&self, prompt: &str, options: Option<&CustomizationOptions>) -> Enhancement {
        match self.try_enhance(prompt, options).await {
            Ok(enhanced) => {
                tracing::info!(chars = enhanced.chars().count(), "prompt enhanced");
                Enhancement::Enhanced(enhanced)
            }
            Err(e) => {
                tracing::warn!("prompt enhancement skipped: {}", e);
                Enhancement::passthrough(prompt, e.to_string())
            }
        }
    }
}
