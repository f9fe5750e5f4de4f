use cb_domain::config::Config;
use cb_domain::Platform;

#[test]
fn default_spark_endpoint_and_threshold() {
    let config = Config::default();
    assert_eq!(config.spark.chat_url, "https://spark-api.xf-yun.com/v3.1/chat");
    assert_eq!(config.spark.domain, "generalv3");
    assert_eq!(config.spark.max_tokens, 4096);
    assert_eq!(config.spark.overflow_threshold, 3072);
}

#[test]
fn default_history_uses_chatgpt_with_prompt() {
    let config = Config::default();
    assert_eq!(config.history.default_platform, Platform::ChatGpt);
    assert_eq!(config.history.system_prompt, "You are a helpful assistant.");
}

#[test]
fn empty_toml_fills_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.openai.model, "gpt-3.5-turbo");
    assert_eq!(config.openai.api_key_env, "OPENAI_API_KEY");
    assert!((config.bot.temperature - 0.6).abs() < f32::EPSILON);
}

#[test]
fn partial_sections_parse() {
    let toml_str = r#"
[history]
default_platform = "xunfei"
max_context_tokens = 1200

[spark]
overflow_threshold = 2048

[bot]
block_words = ["spam"]
group_trigger_rule = "^@bot\\s*"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.history.default_platform, Platform::XunFei);
    assert_eq!(config.history.max_context_tokens, 1200);
    assert_eq!(config.spark.overflow_threshold, 2048);
    assert_eq!(config.spark.stream_timeout_ms, 60_000);
    assert_eq!(config.bot.block_words, vec!["spam"]);
    assert!(config.validate().is_empty());
}

#[test]
fn config_round_trips_through_toml() {
    let config = Config::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.spark.chat_url, config.spark.chat_url);
    assert_eq!(parsed.history.max_context_tokens, config.history.max_context_tokens);
}
