use std::sync::Arc;

use cb_domain::config::Config;
use cb_domain::error::Result;
use cb_domain::trace::TraceEvent;
use cb_domain::Platform;

use crate::gate::{ChatKind, GateDecision, MessageGate};
use crate::service::ChatService;

/// What the front end should do with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    /// Send this text back.
    Answered { text: String },
    /// Stay silent: the message was not addressed to the bot.
    Ignored,
    /// The message was refused before reaching a back end.
    Refused { reason: String },
    /// The back end answered, but the reply contained a blocked word.
    Withheld { word: String },
}

/// Shared state for every front-end command.
#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub service: Arc<ChatService>,
    pub gate: Arc<MessageGate>,
}

impl BotState {
    /// Gate, answer, and gate again: the full path of one inbound message.
    pub async fn handle(
        &self,
        kind: ChatKind,
        user_key: &str,
        platform: Platform,
        text: &str,
    ) -> Result<Reply> {
        let question = match self.gate.inbound(kind, text) {
            GateDecision::Answer(q) => q,
            GateDecision::Ignore => return Ok(Reply::Ignored),
            GateDecision::Refuse { reason } => {
                TraceEvent::MessageRejected {
                    user_key: user_key.to_owned(),
                    reason: reason.clone(),
                }
                .emit();
                return Ok(Reply::Refused { reason });
            }
        };

        let answer = self.service.ask(user_key, platform, &question).await?;

        if let Some(word) = self.gate.blocked_reply_word(&answer) {
            tracing::info!(user_key = %user_key, word = %word, "withholding reply");
            return Ok(Reply::Withheld { word: word.to_owned() });
        }
        Ok(Reply::Answered { text: answer })
    }
}
