use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::message::Message;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Platform
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which back end answers a user's messages.
///
/// The serde names are the identifiers used in config files and on the
/// command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Platform {
    /// OpenAI-compatible HTTP completion API. Uses a system prompt and a
    /// client-side token estimate.
    #[default]
    #[serde(rename = "chatgpt")]
    ChatGpt,
    /// iFlytek Spark streaming WebSocket API. No system prompt; token usage
    /// is computed by the server.
    #[serde(rename = "xunfei")]
    XunFei,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::ChatGpt, Platform::XunFei];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::ChatGpt => "chatgpt",
            Platform::XunFei => "xunfei",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatgpt" | "openai" => Ok(Platform::ChatGpt),
            "xunfei" | "spark" => Ok(Platform::XunFei),
            other => Err(Error::Config(format!("unknown platform: {other}"))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A chat participant and their rolling conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Generated identity, sent to back ends as the user id.
    pub id: String,
    /// External identity (the front end's username).
    pub key: String,
    pub platform: Platform,
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(key: impl Into<String>, platform: Platform, history: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            key: key.into(),
            platform,
            history,
            created_at: now,
            updated_at: now,
        }
    }
}
