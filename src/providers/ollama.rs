//! Local Ollama provider speaking the native `/api/chat` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::traits::{ChatMessage, Provider};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>, timeout: Duration) -> Self {
        let base_url = base_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/')
            .to_string();
        Self {
            base_url,
            api_key: api_key.map(ToString::to_string),
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn chat_url(&self) -> String {
        if self.base_url.ends_with("/api/chat") {
            self.base_url.clone()
        } else {
            format!("{}/api/chat", self.base_url)
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat_with_history(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String> {
        let request = OllamaChatRequest {
            model,
            messages,
            stream: false,
            options: OllamaOptions { temperature },
        };

        let mut builder = self.client.post(self.chat_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(super::api_error(self.name(), response).await);
        }

        let body: OllamaChatResponse = response.json().await?;
        if let Some(error) = body.error {
            anyhow::bail!("ollama error: {}", super::sanitize_api_error(&error));
        }
        body.message
            .map(|m| m.content)
            .ok_or_else(|| anyhow::anyhow!("No response from ollama"))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
