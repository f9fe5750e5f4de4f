/// Shared error type used across all chatbridge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Missing or invalid credentials/config. Fatal at startup.
    #[error("config: {0}")]
    Config(String),

    /// The signed connection URL could not be produced.
    #[error("signature: {0}")]
    Signature(String),

    /// The streaming socket closed or errored before the final frame.
    #[error("stream: {0}")]
    Stream(String),

    /// The caller cancelled a streaming session before it resolved.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The streaming endpoint kept answering with nonzero status codes.
    #[error("protocol: code {code}: {message}")]
    Protocol { code: i64, message: String },

    /// The completion endpoint answered with a non-success status.
    #[error("completion endpoint returned HTTP {status}: {body}")]
    HttpAdapter { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
