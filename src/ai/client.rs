use super::{parse_reply, render_prompt, ProductCopy, ProductCopyEnhancer};
use crate::models::Config;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completions client that rewrites product copy.
pub struct OpenAiCopyClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiCopyClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| Error::AiProvider("OPENAI_API_KEY not set".to_string()))?;
        Self::new(api_key, config.openai_model.clone())
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn chat_completion(&self, prompt: String) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send request to OpenAI: {}", e);
                e
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            tracing::error!("OpenAI API error (status {}): {}", status, error_text);
            return Err(Error::AiProvider(format!(
                "OpenAI API error (status {}): {}",
                status, error_text
            )));
        }

        let body: ChatCompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::AiProvider("Empty response from OpenAI chat API".to_string()))
    }
}

#[async_trait]
impl ProductCopyEnhancer for OpenAiCopyClient {
    async fn enhance(&self, copy: &ProductCopy) -> Result<ProductCopy> {
        copy.validate()?;
        let reply = self.chat_completion(render_prompt(copy)).await?;
        let enhanced = parse_reply(&reply)?;
        tracing::info!("Enhanced copy: '{}' -> '{}'", copy.title, enhanced.title);
        Ok(enhanced)
    }
}
