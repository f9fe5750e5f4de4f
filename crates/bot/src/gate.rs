//! Which inbound messages get answered, and which replies get sent.

use regex::Regex;

use cb_domain::config::BotConfig;
use cb_domain::error::{Error, Result};

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

/// Outcome of gating an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Answer, sending this (trigger-stripped) text to the back end.
    Answer(String),
    /// Not addressed to the bot.
    Ignore,
    /// Addressed to the bot but refused.
    Refuse { reason: String },
}

#[derive(Debug, Clone)]
pub struct MessageGate {
    private_keyword: String,
    group_rule: Option<Regex>,
    disable_group: bool,
    block_words: Vec<String>,
    reply_block_words: Vec<String>,
}

impl MessageGate {
    pub fn from_config(cfg: &BotConfig) -> Result<Self> {
        let group_rule = match cfg.group_trigger_rule.as_deref().map(str::trim) {
            Some(rule) if !rule.is_empty() => Some(Regex::new(rule).map_err(|e| {
                Error::Config(format!("invalid group_trigger_rule '{rule}': {e}"))
            })?),
            _ => None,
        };

        Ok(Self {
            private_keyword: cfg.private_trigger_keyword.trim().to_string(),
            group_rule,
            disable_group: cfg.disable_group_message,
            block_words: non_empty(&cfg.block_words),
            reply_block_words: non_empty(&cfg.reply_block_words),
        })
    }

    /// Decide whether to answer `text`, and with what.
    pub fn inbound(&self, kind: ChatKind, text: &str) -> GateDecision {
        let stripped = match kind {
            ChatKind::Private => match self.strip_private(text) {
                Some(t) => t,
                None => return GateDecision::Ignore,
            },
            ChatKind::Group => {
                if self.disable_group {
                    return GateDecision::Ignore;
                }
                match self.strip_group(text) {
                    Some(t) => t,
                    None => return GateDecision::Ignore,
                }
            }
        };

        if stripped.is_empty() {
            return GateDecision::Ignore;
        }
        if let Some(word) = first_hit(&self.block_words, &stripped) {
            return GateDecision::Refuse {
                reason: format!("message contains blocked word '{word}'"),
            };
        }
        GateDecision::Answer(stripped)
    }

    /// The blocked word `reply` contains, if any. Such replies are withheld.
    pub fn blocked_reply_word(&self, reply: &str) -> Option<&str> {
        first_hit(&self.reply_block_words, reply)
    }

    fn strip_private(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if self.private_keyword.is_empty() {
            return Some(text.to_string());
        }
        text.strip_prefix(self.private_keyword.as_str())
            .map(|rest| rest.trim().to_string())
    }

    fn strip_group(&self, text: &str) -> Option<String> {
        let text = text.trim();
        let Some(rule) = &self.group_rule else {
            return Some(text.to_string());
        };
        let m = rule.find(text).filter(|m| m.start() == 0)?;
        Some(text[m.end()..].trim().to_string())
    }
}

fn non_empty(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn first_hit<'a>(words: &'a [String], text: &str) -> Option<&'a str> {
    words.iter().find(|w| text.contains(w.as_str())).map(String::as_str)
}
