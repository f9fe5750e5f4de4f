use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OpenAI-compatible completion endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL; `/chat/completions` is appended. Overridden by `API`.
    #[serde(default = "d_openai_base_url")]
    pub base_url: String,
    /// Overridden by `MODEL`.
    #[serde(default = "d_openai_model")]
    pub model: String,
    /// Env var holding the bearer key.
    #[serde(default = "d_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: d_openai_base_url(),
            model: d_openai_model(),
            api_key_env: d_openai_key_env(),
            timeout_ms: 30_000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Spark streaming endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparkConfig {
    /// HTTP(S) form of the chat endpoint. It is signed as-is and upgraded
    /// to `ws(s)://` before connecting.
    #[serde(default = "d_spark_chat_url")]
    pub chat_url: String,
    #[serde(default = "d_spark_domain")]
    pub domain: String,
    #[serde(default = "d_4096")]
    pub max_tokens: u32,
    #[serde(default = "d_spark_app_id_env")]
    pub app_id_env: String,
    #[serde(default = "d_spark_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_spark_api_secret_env")]
    pub api_secret_env: String,
    /// A final frame reporting more total tokens than this marks the
    /// conversation as over the limit.
    #[serde(default = "d_3072")]
    pub overflow_threshold: u32,
    /// Upper bound on one streaming session, handshake included.
    #[serde(default = "d_60000")]
    pub stream_timeout_ms: u64,
    /// Frames with a nonzero status code are skipped; this many in a row
    /// fail the session.
    #[serde(default = "d_3")]
    pub max_consecutive_error_frames: u32,
}

impl Default for SparkConfig {
    fn default() -> Self {
        Self {
            chat_url: d_spark_chat_url(),
            domain: d_spark_domain(),
            max_tokens: 4096,
            app_id_env: d_spark_app_id_env(),
            api_key_env: d_spark_api_key_env(),
            api_secret_env: d_spark_api_secret_env(),
            overflow_threshold: 3072,
            stream_timeout_ms: 60_000,
            max_consecutive_error_frames: 3,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_openai_model() -> String {
    "gpt-3.5-turbo".into()
}
fn d_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_spark_chat_url() -> String {
    "https://spark-api.xf-yun.com/v3.1/chat".into()
}
fn d_spark_domain() -> String {
    "generalv3".into()
}
fn d_spark_app_id_env() -> String {
    "XUNFEI_APP_ID".into()
}
fn d_spark_api_key_env() -> String {
    "XUNFEI_API_KEY".into()
}
fn d_spark_api_secret_env() -> String {
    "XUNFEI_API_SECRET".into()
}
fn d_30000() -> u64 {
    30_000
}
fn d_60000() -> u64 {
    60_000
}
fn d_4096() -> u32 {
    4096
}
fn d_3072() -> u32 {
    3072
}
fn d_3() -> u32 {
    3
}
