use serde::{Deserialize, Serialize};

use crate::user::Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Platform assigned to users on first contact.
    #[serde(default)]
    pub default_platform: Platform,
    /// Initial system message for platforms that use one.
    #[serde(default = "d_system_prompt")]
    pub system_prompt: String,
    /// Client-side token budget for platforms without server-reported usage.
    #[serde(default = "d_3000")]
    pub max_context_tokens: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_platform: Platform::ChatGpt,
            system_prompt: d_system_prompt(),
            max_context_tokens: 3000,
        }
    }
}

fn d_system_prompt() -> String {
    "You are a helpful assistant.".into()
}
fn d_3000() -> usize {
    3000
}
