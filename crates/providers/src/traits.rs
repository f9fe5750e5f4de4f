use cb_domain::error::Result;
use cb_domain::{ChatAnswer, Message};
use tokio_util::sync::CancellationToken;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A back-end-agnostic chat request: one turn over a full history.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Stable identity of the asking user, forwarded where the back end
    /// accepts one.
    pub user_id: String,
    /// The whole conversation, oldest first, ending with the new message.
    pub messages: Vec<Message>,
    /// Sampling temperature. `None` lets the back end choose.
    pub temperature: Option<f32>,
    /// Cancelling this token aborts the request with `Error::Cancelled`.
    pub cancel: CancellationToken,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core back-end trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every conversational back end implements.
///
/// Implementations translate between the shared message types and the
/// wire format of one API, and resolve each call exactly once.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the conversation and wait for the complete answer.
    async fn chat(&self, req: ChatRequest) -> Result<ChatAnswer>;

    /// A unique identifier for this back-end instance.
    fn backend_id(&self) -> &str;

    /// Whether answers arrive over a streaming connection.
    fn streaming(&self) -> bool {
        false
    }
}
