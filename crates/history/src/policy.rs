use cb_domain::config::HistoryConfig;
use cb_domain::{Message, Platform};

use crate::budget::{cap_prompt, Budget};

/// How one platform shapes its users' histories.
#[derive(Debug, Clone)]
pub struct PlatformPolicy {
    /// Default content of the pinned System message. `None` for platforms
    /// without a system prompt.
    pub system_prompt: Option<String>,
    pub budget: Budget,
}

impl PlatformPolicy {
    pub fn uses_system_prompt(&self) -> bool {
        self.system_prompt.is_some()
    }

    /// History a new (or cleared) user starts with.
    pub fn initial_history(&self) -> Vec<Message> {
        match &self.system_prompt {
            Some(prompt) => vec![Message::system(prompt.clone())],
            None => Vec::new(),
        }
    }

    /// Fit a replacement prompt into the budget.
    pub fn fit_prompt(&self, prompt: &str) -> String {
        match self.budget {
            Budget::Estimated { max_tokens } => cap_prompt(prompt, max_tokens),
            Budget::ServerReported => prompt.to_string(),
        }
    }
}

/// Per-platform policies plus the platform assigned on first contact.
#[derive(Debug, Clone)]
pub struct HistoryPolicies {
    default_platform: Platform,
    chatgpt: PlatformPolicy,
    xunfei: PlatformPolicy,
}

impl HistoryPolicies {
    pub fn new(default_platform: Platform, chatgpt: PlatformPolicy, xunfei: PlatformPolicy) -> Self {
        Self {
            default_platform,
            chatgpt,
            xunfei,
        }
    }

    /// `chatgpt` gets the configured system prompt and an estimated budget;
    /// `xunfei` has no prompt and relies on the server's usage report.
    pub fn from_config(cfg: &HistoryConfig) -> Self {
        let budget = Budget::Estimated {
            max_tokens: cfg.max_context_tokens,
        };
        let chatgpt = PlatformPolicy {
            system_prompt: Some(cap_prompt(&cfg.system_prompt, cfg.max_context_tokens)),
            budget,
        };
        let xunfei = PlatformPolicy {
            system_prompt: None,
            budget: Budget::ServerReported,
        };
        Self::new(cfg.default_platform, chatgpt, xunfei)
    }

    pub fn default_platform(&self) -> Platform {
        self.default_platform
    }

    pub fn policy(&self, platform: Platform) -> &PlatformPolicy {
        match platform {
            Platform::ChatGpt => &self.chatgpt,
            Platform::XunFei => &self.xunfei,
        }
    }
}

impl Default for HistoryPolicies {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}
