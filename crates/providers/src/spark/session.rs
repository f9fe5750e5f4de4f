//! One streaming answer over one socket.
//!
//! [`AnswerAccumulator`] is the pure frame-folding state machine;
//! [`StreamingSession`] drives it from a live WebSocket and resolves exactly
//! once: with the accumulated answer, or with an error.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use cb_domain::config::SparkConfig;
use cb_domain::error::{Error, Result};
use cb_domain::Usage;

use super::protocol::{ResponseFrame, StreamingRequest};

/// Lifecycle of a [`StreamingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Streaming,
    Resolved,
    Failed,
}

/// The complete answer of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatedAnswer {
    pub text: String,
    pub usage: Option<Usage>,
    /// `total_tokens` on the final frame exceeded the overflow threshold.
    pub is_over_token_limit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// More frames are expected.
    Continue,
    Resolved(AccumulatedAnswer),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Accumulator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Folds response frames, in arrival order, into one answer.
///
/// Frames with a nonzero `header.code` and frames that do not parse are
/// skipped; `max_consecutive_errors` of them in a row fail with
/// [`Error::Protocol`]. A good frame resets the count.
#[derive(Debug)]
pub struct AnswerAccumulator {
    text: String,
    overflow_threshold: u32,
    max_consecutive_errors: u32,
    consecutive_errors: u32,
    resolved: bool,
}

impl AnswerAccumulator {
    pub fn new(overflow_threshold: u32, max_consecutive_errors: u32) -> Self {
        Self {
            text: String::new(),
            overflow_threshold,
            max_consecutive_errors,
            consecutive_errors: 0,
            resolved: false,
        }
    }

    /// Text accumulated so far.
    pub fn partial(&self) -> &str {
        &self.text
    }

    pub fn feed_text(&mut self, raw: &str) -> Result<FrameOutcome> {
        match serde_json::from_str::<ResponseFrame>(raw) {
            Ok(frame) => self.feed(frame),
            Err(e) => self.bad_frame(-1, format!("unparsable frame: {e}")),
        }
    }

    pub fn feed(&mut self, frame: ResponseFrame) -> Result<FrameOutcome> {
        if self.resolved {
            return Err(Error::Stream("frame received after the final frame".into()));
        }
        if frame.is_error() {
            return self.bad_frame(frame.header.code, frame.header.message);
        }
        self.consecutive_errors = 0;
        self.text.push_str(&frame.delta());

        if !frame.is_final() {
            return Ok(FrameOutcome::Continue);
        }

        self.resolved = true;
        let usage = frame.usage();
        let total_tokens = usage.map(|u| u.total_tokens).unwrap_or(0);
        Ok(FrameOutcome::Resolved(AccumulatedAnswer {
            text: std::mem::take(&mut self.text),
            usage: usage.map(Into::into),
            is_over_token_limit: total_tokens > self.overflow_threshold,
        }))
    }

    fn bad_frame(&mut self, code: i64, message: String) -> Result<FrameOutcome> {
        self.consecutive_errors += 1;
        tracing::warn!(
            code,
            message = %message,
            consecutive = self.consecutive_errors,
            "streaming endpoint sent an error frame, skipping"
        );
        if self.consecutive_errors >= self.max_consecutive_errors {
            return Err(Error::Protocol { code, message });
        }
        Ok(FrameOutcome::Continue)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub overflow_threshold: u32,
    pub max_consecutive_error_frames: u32,
    /// Bound on the whole session, handshake included.
    pub timeout: Duration,
}

impl SessionOptions {
    pub fn from_config(cfg: &SparkConfig) -> Self {
        Self {
            overflow_threshold: cfg.overflow_threshold,
            max_consecutive_error_frames: cfg.max_consecutive_error_frames,
            timeout: Duration::from_millis(cfg.stream_timeout_ms),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&SparkConfig::default())
    }
}

/// A single-use streaming session: connect, send one request frame,
/// accumulate frames until the final one.
pub struct StreamingSession {
    url: String,
    request: StreamingRequest,
    options: SessionOptions,
    state: SessionState,
}

impl StreamingSession {
    /// `url` must already be signed and in `ws(s)://` form.
    pub fn new(url: impl Into<String>, request: StreamingRequest, options: SessionOptions) -> Self {
        Self {
            url: url.into(),
            request,
            options,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to its single resolution.
    ///
    /// Fails with [`Error::Stream`] if the socket closes or errors before
    /// the final frame, [`Error::Timeout`] when the session outlives its
    /// timeout, and [`Error::Cancelled`] when `cancel` fires first.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<AccumulatedAnswer> {
        if self.state != SessionState::Idle {
            return Err(Error::Stream(format!(
                "streaming session already used (state {:?})",
                self.state
            )));
        }

        let timeout = self.options.timeout;
        let result = match tokio::time::timeout(timeout, self.drive(cancel)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "streaming session exceeded {} ms",
                timeout.as_millis()
            ))),
        };

        match &result {
            Ok(answer) => {
                self.transition(SessionState::Resolved);
                tracing::debug!(
                    chars = answer.text.chars().count(),
                    over_token_limit = answer.is_over_token_limit,
                    "streaming session resolved"
                );
            }
            Err(e) => {
                self.transition(SessionState::Failed);
                tracing::warn!(error = %e, "streaming session failed");
            }
        }
        result
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Result<AccumulatedAnswer> {
        self.transition(SessionState::Connecting);
        let (ws, _response) = tokio::select! {
            conn = tokio_tungstenite::connect_async(self.url.as_str()) => {
                conn.map_err(|e| Error::Stream(format!("connect failed: {e}")))?
            }
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled("cancelled while connecting".into()));
            }
        };
        self.transition(SessionState::Open);

        let (mut sink, mut stream) = ws.split();
        let payload = serde_json::to_string(&self.request)?;
        sink.send(WsMessage::Text(payload))
            .await
            .map_err(|e| Error::Stream(format!("failed to send request frame: {e}")))?;
        self.transition(SessionState::Streaming);

        let mut acc = AnswerAccumulator::new(
            self.options.overflow_threshold,
            self.options.max_consecutive_error_frames,
        );

        loop {
            let next = tokio::select! {
                msg = stream.next() => msg,
                _ = cancel.cancelled() => {
                    let _ = sink.close().await;
                    return Err(Error::Cancelled(format!(
                        "cancelled after {} chars",
                        acc.partial().chars().count()
                    )));
                }
            };

            let raw = match next {
                Some(Ok(WsMessage::Text(text))) => text,
                Some(Ok(WsMessage::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.into_owned()).unwrap_or_default();
                    return Err(Error::Stream(format!(
                        "socket closed before the final frame: {reason}"
                    )));
                }
                // Ping/Pong are answered by tungstenite.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(Error::Stream(e.to_string())),
                None => return Err(Error::Stream("socket ended before the final frame".into())),
            };

            match acc.feed_text(&raw) {
                Ok(FrameOutcome::Continue) => {}
                Ok(FrameOutcome::Resolved(answer)) => {
                    let _ = sink.close().await;
                    return Ok(answer);
                }
                Err(e) => {
                    let _ = sink.close().await;
                    return Err(e);
                }
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "streaming session state");
        self.state = next;
    }
}
