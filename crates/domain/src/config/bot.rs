use serde::{Deserialize, Serialize};

/// Front-end behaviour: sampling temperature and the rules deciding which
/// inbound messages get answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Overridden by `TEMPERATURE`.
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    /// Private messages must start with this keyword (stripped before
    /// sending). Empty answers every private message.
    #[serde(default)]
    pub private_trigger_keyword: String,
    /// Regex a group message must match at its start; the match is stripped.
    /// `None` answers every group message.
    #[serde(default)]
    pub group_trigger_rule: Option<String>,
    #[serde(default)]
    pub disable_group_message: bool,
    /// Inbound messages containing any of these are refused.
    #[serde(default)]
    pub block_words: Vec<String>,
    /// Replies containing any of these are withheld.
    #[serde(default)]
    pub reply_block_words: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            temperature: d_temperature(),
            private_trigger_keyword: String::new(),
            group_trigger_rule: None,
            disable_group_message: false,
            block_words: Vec::new(),
            reply_block_words: Vec::new(),
        }
    }
}

fn d_temperature() -> f32 {
    0.6
}
