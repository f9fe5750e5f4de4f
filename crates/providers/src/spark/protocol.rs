//! Wire shapes of the Spark chat socket.
//!
//! One request frame goes out per session; response frames arrive until one
//! carries `header.status == 2`.

use serde::{Deserialize, Serialize};

use cb_domain::{Message, Usage};

/// `header.status` of the last frame of an answer.
pub const STATUS_FINAL: i64 = 2;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingRequest {
    pub header: RequestHeader,
    pub parameter: RequestParameter,
    pub payload: RequestPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub app_id: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParameter {
    pub chat: ChatParameter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatParameter {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub message: RequestMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub text: Vec<Message>,
}

impl StreamingRequest {
    pub fn new(
        app_id: impl Into<String>,
        uid: impl Into<String>,
        chat: ChatParameter,
        history: Vec<Message>,
    ) -> Self {
        Self {
            header: RequestHeader {
                app_id: app_id.into(),
                uid: uid.into(),
            },
            parameter: RequestParameter { chat },
            payload: RequestPayload {
                message: RequestMessage { text: history },
            },
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response frames
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub header: ResponseHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ResponsePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub status: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    #[serde(default)]
    pub choices: Choices,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResponseUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choices {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub seq: i64,
    #[serde(default)]
    pub text: Vec<ChoiceText>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceText {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub index: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseUsage {
    pub text: TextUsage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUsage {
    #[serde(default)]
    pub question_tokens: u32,
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<TextUsage> for Usage {
    fn from(u: TextUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

impl ResponseFrame {
    pub fn is_error(&self) -> bool {
        self.header.code != 0
    }

    pub fn is_final(&self) -> bool {
        self.header.status == STATUS_FINAL
    }

    /// Text carried by this frame, all choice fragments concatenated.
    pub fn delta(&self) -> String {
        self.payload
            .as_ref()
            .map(|p| p.choices.text.iter().map(|t| t.content.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn usage(&self) -> Option<TextUsage> {
        self.payload.as_ref()?.usage.as_ref().map(|u| u.text)
    }
}
