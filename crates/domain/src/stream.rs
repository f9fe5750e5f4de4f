use serde::{Deserialize, Serialize};

/// Token usage for a completion, as reported by the back end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A back-end-neutral answer to one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAnswer {
    /// The assistant's reply text.
    pub text: String,
    /// Token usage, when the back end reports it.
    pub usage: Option<Usage>,
    /// Set when the back end reports that the conversation has grown past
    /// its token threshold. Platforms with a server-reported budget trim
    /// history on this signal.
    pub over_token_limit: bool,
}

impl ChatAnswer {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            over_token_limit: false,
        }
    }
}
