//! OpenAI-compatible completion adapter.
//!
//! Works with any endpoint that follows the chat completions contract:
//! one POST per turn, the full history in the body, one answer back.

use crate::traits::{ChatBackend, ChatRequest};
use crate::util::{from_reqwest, resolve_secret};
use cb_domain::config::OpenAiConfig;
use cb_domain::error::{Error, Result};
use cb_domain::{ChatAnswer, Message, Usage};
use serde_json::Value;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Completion adapter for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Build the adapter from config, reading the bearer key from the
    /// environment variable named in `api_key_env`.
    pub fn from_config(cfg: &OpenAiConfig) -> Result<Self> {
        let api_key = resolve_secret(&cfg.api_key_env)?;
        Self::new(
            &cfg.base_url,
            api_key,
            &cfg.model,
            Duration::from_millis(cfg.timeout_ms),
        )
    }

    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "openai_compat".into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_chat_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatAnswer> {
        let url = self.chat_url();
        let body = self.build_chat_body(req);

        tracing::debug!(
            backend = %self.id,
            url = %url,
            messages = req.messages.len(),
            "completion request"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::HttpAdapter {
                status: status.as_u16(),
                body: resp_text,
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_chat_response(&resp_json)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_openai(msg: &Message) -> Value {
    serde_json::json!({
        "role": msg.role.as_str(),
        "content": msg.content,
    })
}

fn parse_chat_response(body: &Value) -> Result<ChatAnswer> {
    let message = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| Error::Http("no choices[0].message in completion response".into()))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim_matches('\n')
        .to_string();

    Ok(ChatAnswer {
        text: content,
        usage: body.get("usage").and_then(parse_openai_usage),
        over_token_limit: false,
    })
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatAnswer> {
        let cancel = req.cancel.clone();
        tokio::select! {
            answer = self.send(&req) => answer,
            _ = cancel.cancelled() => Err(Error::Cancelled("completion request cancelled".into())),
        }
    }

    fn backend_id(&self) -> &str {
        &self.id
    }
}
