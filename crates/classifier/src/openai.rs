//! Minimal OpenAI-compatible chat-completions client shared by the
//! triage stage, deep classifier stage, and the LLM validator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trace_governance_common::error::{AppError, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(endpoint: String, api_key: Option<String>, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint, api_key })
    }

    /// Sends a single system+user chat turn and returns the raw JSON text
    /// the model produced. Caller parses it into whatever shape the
    /// calling stage expects.
    pub async fn complete_json(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        timeout_ms: u64,
    ) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.0,
            max_tokens,
        };

        let send = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Content-Type", "application/json");
        let send = match &self.api_key {
            Some(key) => send.bearer_auth(key),
            None => send,
        };

        let response = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            send.json(&request).send(),
        )
        .await
        .map_err(|_| AppError::ClassifierUnavailable("request timed out".into()))?
        .map_err(|e| AppError::ClassifierUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::ClassifierUnavailable(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ClassifierUnavailable(format!("malformed response body: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ClassifierUnavailable("empty choices array".into()))
    }
}

pub fn parse_json<T: for<'de> Deserialize<'de>>(raw: &str) -> Option<T> {
    serde_json::from_str::<Value>(raw).ok().and_then(|v| serde_json::from_value(v).ok())
}
