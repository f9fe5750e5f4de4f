//! Signed connection URLs for the Spark streaming endpoint.
//!
//! The endpoint authenticates the WebSocket upgrade through query
//! parameters: an HMAC-SHA256 signature over the host, the request date,
//! and the request line, keyed with the API secret.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

use cb_domain::config::SparkConfig;
use cb_domain::error::{Error, Result};

use crate::util::resolve_secret;

type HmacSha256 = Hmac<Sha256>;

/// Application credentials for the streaming endpoint.
#[derive(Clone)]
pub struct SparkCredentials {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,
}

impl SparkCredentials {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read all three credentials from the environment variables named in
    /// config.
    pub fn from_config(cfg: &SparkConfig) -> Result<Self> {
        Ok(Self {
            app_id: resolve_secret(&cfg.app_id_env)?,
            api_key: resolve_secret(&cfg.api_key_env)?,
            api_secret: resolve_secret(&cfg.api_secret_env)?,
        })
    }
}

impl std::fmt::Debug for SparkCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparkCredentials")
            .field("app_id", &self.app_id)
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

// ── signing steps ───────────────────────────────────────────────────

/// RFC 7231 HTTP-date, e.g. `Tue, 07 Nov 2023 08:00:00 GMT`.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn signing_string(host: &str, date: &str, path: &str) -> String {
    format!("host: {host}\ndate: {date}\nGET {path} HTTP/1.1")
}

/// Base64 of HMAC-SHA256(`secret`, `message`).
pub fn sign(secret: &str, message: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signature(format!("HMAC setup failed: {e}")))?;
    mac.update(message.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Base64 of the authorization descriptor carrying key and signature.
pub fn authorization(api_key: &str, signature: &str) -> String {
    let origin = format!(
        "api_key=\"{api_key}\",algorithm=\"hmac-sha256\",headers=\"host date request-line\",signature=\"{signature}\""
    );
    BASE64.encode(origin)
}

/// Produce the signed URL for `endpoint` at time `now`.
///
/// The scheme of `endpoint` is kept; callers upgrade it with
/// [`to_websocket_url`] before connecting. Deterministic for fixed inputs.
pub fn sign_url(endpoint: &str, creds: &SparkCredentials, now: DateTime<Utc>) -> Result<String> {
    if creds.api_key.is_empty() || creds.api_secret.is_empty() {
        return Err(Error::Signature("api key and api secret must be non-empty".into()));
    }

    let url = Url::parse(endpoint)
        .map_err(|e| Error::Config(format!("invalid streaming endpoint '{endpoint}': {e}")))?;
    let host = match (url.host_str(), url.port()) {
        (Some(h), Some(port)) => format!("{h}:{port}"),
        (Some(h), None) => h.to_string(),
        (None, _) => {
            return Err(Error::Config(format!("streaming endpoint '{endpoint}' has no host")))
        }
    };
    let path = url.path();

    let date = http_date(now);
    let signature = sign(&creds.api_secret, &signing_string(&host, &date, path))?;
    let authorization = authorization(&creds.api_key, &signature);

    Ok(format!(
        "{}://{}{}?authorization={}&date={}&host={}",
        url.scheme(),
        host,
        path,
        urlencoding::encode(&authorization),
        urlencoding::encode(&date),
        urlencoding::encode(&host),
    ))
}

/// Upgrade an `http(s)` URL to its `ws(s)` form. Other schemes pass through.
pub fn to_websocket_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
