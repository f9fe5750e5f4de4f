mod backends;
mod bot;
mod history;

pub use backends::*;
pub use bot::*;
pub use history::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest client-side budget that still fits a system prompt and one
/// message.
pub const MIN_CONTEXT_TOKENS: usize = 64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub spark: SparkConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Apply the bot's well-known environment variables on top of the
    /// file config.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(api) = get("API") {
            self.openai.base_url = api.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("MODEL") {
            self.openai.model = model;
        }
        if let Some(raw) = get("TEMPERATURE") {
            match raw.trim().parse::<f32>() {
                Ok(t) => self.bot.temperature = t,
                Err(_) => tracing::warn!(value = %raw, "ignoring unparsable TEMPERATURE"),
            }
        }
        if let Some(words) = get("BLOCK_WORDS") {
            self.bot.block_words = split_list(&words);
        }
        if let Some(words) = get("CHATGPT_BLOCK_WORDS") {
            self.bot.reply_block_words = split_list(&words);
        }
        if let Some(keyword) = get("CHAT_PRIVATE_TRIGGER_KEYWORD") {
            self.bot.private_trigger_keyword = keyword;
        }
        if let Some(rule) = get("CHAT_TRIGGER_RULE") {
            self.bot.group_trigger_rule = Some(rule);
        }
        if let Some(flag) = get("DISABLE_GROUP_MESSAGE") {
            self.bot.disable_group_message = flag.trim() == "true";
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good. Credentials are not
    /// checked here; they are resolved when the back ends are built.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.openai.base_url.is_empty() {
            errors.push(ConfigError::error("openai.base_url", "base_url must not be empty"));
        }
        if self.openai.model.is_empty() {
            errors.push(ConfigError::error("openai.model", "model must not be empty"));
        }
        if self.openai.timeout_ms == 0 {
            errors.push(ConfigError::error("openai.timeout_ms", "timeout must be greater than 0"));
        }

        let url = self.spark.chat_url.as_str();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.push(ConfigError::error(
                "spark.chat_url",
                "chat_url must be an http(s) URL (it is signed before the ws upgrade)",
            ));
        }
        if self.spark.domain.is_empty() {
            errors.push(ConfigError::error("spark.domain", "domain must not be empty"));
        }
        if self.spark.max_tokens == 0 || self.spark.max_tokens > 8192 {
            errors.push(ConfigError::error("spark.max_tokens", "max_tokens must be in 1..=8192"));
        }
        if self.spark.overflow_threshold == 0 {
            errors.push(ConfigError::error(
                "spark.overflow_threshold",
                "overflow_threshold must be greater than 0",
            ));
        }
        if self.spark.stream_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "spark.stream_timeout_ms",
                "stream_timeout_ms must be greater than 0",
            ));
        }
        if self.spark.max_consecutive_error_frames == 0 {
            errors.push(ConfigError::warning(
                "spark.max_consecutive_error_frames",
                "0 fails a session on its first error frame",
            ));
        }

        if self.history.max_context_tokens < MIN_CONTEXT_TOKENS {
            errors.push(ConfigError::error(
                "history.max_context_tokens",
                format!("max_context_tokens must be at least {MIN_CONTEXT_TOKENS}"),
            ));
        }
        if self.history.system_prompt.is_empty() {
            errors.push(ConfigError::warning(
                "history.system_prompt",
                "empty system prompt",
            ));
        }

        if !(0.0..=2.0).contains(&self.bot.temperature) {
            errors.push(ConfigError::error("bot.temperature", "temperature must be in 0.0..=2.0"));
        }
        if let Some(rule) = &self.bot.group_trigger_rule {
            if let Err(e) = regex::Regex::new(rule) {
                errors.push(ConfigError::error(
                    "bot.group_trigger_rule",
                    format!("invalid regex: {e}"),
                ));
            }
        }
        if self.bot.disable_group_message && self.bot.group_trigger_rule.is_some() {
            errors.push(ConfigError::warning(
                "bot.group_trigger_rule",
                "ignored because disable_group_message is set",
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let issues = Config::default().validate();
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(lookup(&[
            ("API", "http://localhost:8080/v1/"),
            ("MODEL", "gpt-4o-mini"),
            ("TEMPERATURE", "0.2"),
            ("BLOCK_WORDS", "foo, bar,,"),
            ("CHATGPT_BLOCK_WORDS", "baz"),
            ("CHAT_PRIVATE_TRIGGER_KEYWORD", "bot"),
            ("CHAT_TRIGGER_RULE", "^@bot"),
            ("DISABLE_GROUP_MESSAGE", "true"),
        ]));
        assert_eq!(cfg.openai.base_url, "http://localhost:8080/v1");
        assert_eq!(cfg.openai.model, "gpt-4o-mini");
        assert!((cfg.bot.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(cfg.bot.block_words, vec!["foo", "bar"]);
        assert_eq!(cfg.bot.reply_block_words, vec!["baz"]);
        assert_eq!(cfg.bot.private_trigger_keyword, "bot");
        assert_eq!(cfg.bot.group_trigger_rule.as_deref(), Some("^@bot"));
        assert!(cfg.bot.disable_group_message);
    }

    #[test]
    fn bad_temperature_override_is_ignored() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(lookup(&[("TEMPERATURE", "warm")]));
        assert!((cfg.bot.temperature - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::default();
        cfg.spark.chat_url = "wss://spark-api.xf-yun.com/v3.1/chat".into();
        cfg.bot.temperature = 3.0;
        cfg.bot.group_trigger_rule = Some("(".into());
        let fields: Vec<String> = cfg
            .validate()
            .into_iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .map(|e| e.field)
            .collect();
        assert!(fields.contains(&"spark.chat_url".to_string()));
        assert!(fields.contains(&"bot.temperature".to_string()));
        assert!(fields.contains(&"bot.group_trigger_rule".to_string()));
    }
}
