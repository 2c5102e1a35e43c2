//! Generic OpenAI-compatible completion client.
//!
//! Most hosted LLM APIs follow the same `/v1/chat/completions` format, so a
//! single implementation covers OpenAI, Groq, Mistral, OpenRouter, local
//! gateways, and the rest.

use super::{CompletionClient, CompletionRequest};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiCompatibleClient {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    /// `request_timeout` bounds the whole HTTP exchange; connect timeout is
    /// fixed at 10s. Callers typically wrap calls in a tighter deadline of
    /// their own.
    pub fn new(base_url: &str, api_key: Option<&str>, request_timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!("failed to build timeout client: {error}");
                Client::new()
            });

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            http,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: request.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: request.system,
                },
                WireMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            temperature: request.temperature,
        };

        let mut http_request = self.http.post(&url).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .with_context(|| format!("completion request to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "completion endpoint returned {status}: {}",
                crate::util::truncate_with_ellipsis(&detail, 200)
            ));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("decoding completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion response had no content"))
    }
}
