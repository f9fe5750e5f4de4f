//! Streaming back end for the iFlytek Spark chat socket.

pub mod protocol;
pub mod session;
pub mod signer;

use chrono::Utc;

use cb_domain::config::SparkConfig;
use cb_domain::error::Result;
use cb_domain::ChatAnswer;

use crate::traits::{ChatBackend, ChatRequest};
use protocol::{ChatParameter, StreamingRequest};
use session::{SessionOptions, StreamingSession};
use signer::{sign_url, to_websocket_url, SparkCredentials};

/// Streaming back end: signs a fresh URL and opens one session per turn.
pub struct SparkProvider {
    id: String,
    chat_url: String,
    domain: String,
    max_tokens: u32,
    creds: SparkCredentials,
    options: SessionOptions,
}

impl SparkProvider {
    /// Build the back end, reading credentials from the environment
    /// variables named in config.
    pub fn from_config(cfg: &SparkConfig) -> Result<Self> {
        let creds = SparkCredentials::from_config(cfg)?;
        Ok(Self::new(cfg, creds))
    }

    pub fn new(cfg: &SparkConfig, creds: SparkCredentials) -> Self {
        Self {
            id: "spark".into(),
            chat_url: cfg.chat_url.clone(),
            domain: cfg.domain.clone(),
            max_tokens: cfg.max_tokens,
            creds,
            options: SessionOptions::from_config(cfg),
        }
    }

    /// The request frame for one turn. Every call gets a fresh `chat_id`.
    fn build_request(&self, req: &ChatRequest) -> StreamingRequest {
        StreamingRequest::new(
            self.creds.app_id.clone(),
            req.user_id.clone(),
            ChatParameter {
                domain: self.domain.clone(),
                temperature: req.temperature,
                max_tokens: Some(self.max_tokens),
                chat_id: Some(uuid::Uuid::new_v4().simple().to_string()),
            },
            req.messages.clone(),
        )
    }
}

#[async_trait::async_trait]
impl ChatBackend for SparkProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatAnswer> {
        let signed = sign_url(&self.chat_url, &self.creds, Utc::now())?;
        let request = self.build_request(&req);

        tracing::debug!(
            backend = %self.id,
            uid = %req.user_id,
            messages = req.messages.len(),
            "opening streaming session"
        );

        let mut session =
            StreamingSession::new(to_websocket_url(&signed), request, self.options.clone());
        let answer = session.run(&req.cancel).await?;

        Ok(ChatAnswer {
            text: answer.text,
            usage: answer.usage,
            over_token_limit: answer.is_over_token_limit,
        })
    }

    fn backend_id(&self) -> &str {
        &self.id
    }

    fn streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_domain::Message;

    fn provider() -> SparkProvider {
        SparkProvider::new(
            &SparkConfig::default(),
            SparkCredentials::new("app-1", "key", "secret"),
        )
    }

    #[test]
    fn request_carries_identity_and_history() {
        let req = ChatRequest {
            user_id: "user-7".into(),
            messages: vec![Message::user("q1"), Message::assistant("a1"), Message::user("q2")],
            temperature: Some(0.6),
            ..Default::default()
        };
        let frame = provider().build_request(&req);
        assert_eq!(frame.header.app_id, "app-1");
        assert_eq!(frame.header.uid, "user-7");
        assert_eq!(frame.parameter.chat.domain, "generalv3");
        assert_eq!(frame.parameter.chat.max_tokens, Some(4096));
        assert_eq!(frame.parameter.chat.temperature, Some(0.6));
        assert_eq!(frame.payload.message.text, req.messages);
    }

    #[test]
    fn chat_id_is_fresh_per_request() {
        let p = provider();
        let a = p.build_request(&ChatRequest::default());
        let b = p.build_request(&ChatRequest::default());
        assert!(a.parameter.chat.chat_id.is_some());
        assert_ne!(a.parameter.chat.chat_id, b.parameter.chat.chat_id);
    }
}
