//! Token estimation and trim passes.
//!
//! The estimate is a length heuristic, not a tokenizer: every ASCII
//! character counts a quarter token, every other character a full token,
//! and each message adds a fixed framing overhead. It is deterministic and
//! monotonic in the content, which is all the trim passes rely on.

use cb_domain::{Message, Role};

/// Framing cost charged per message on top of its content.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// How a platform keeps its history bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Client-side: the estimate of the whole history must stay at or
    /// below `max_tokens` after every mutation.
    Estimated { max_tokens: usize },
    /// Server-side: the back end reports when the conversation is over its
    /// limit, and one turn is dropped per report.
    ServerReported,
}

/// Result of a trim pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimOutcome {
    pub removed: usize,
    pub truncated: bool,
    pub estimated_tokens: usize,
}

impl TrimOutcome {
    pub fn changed(&self) -> bool {
        self.removed > 0 || self.truncated
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Estimation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Estimated token count of a piece of text.
pub fn estimate_tokens(text: &str) -> usize {
    let (ascii, other) = text.chars().fold((0usize, 0usize), |(a, o), c| {
        if c.is_ascii() {
            (a + 1, o)
        } else {
            (a, o + 1)
        }
    });
    other + ascii.div_ceil(4)
}

pub fn estimate_message(msg: &Message) -> usize {
    MESSAGE_OVERHEAD_TOKENS + estimate_tokens(&msg.content)
}

pub fn estimate_history(history: &[Message]) -> usize {
    history.iter().map(estimate_message).sum()
}

/// Longest prefix of `text` whose estimate fits in `max_tokens`, cut at a
/// char boundary.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    let mut ascii = 0usize;
    let mut other = 0usize;
    for (idx, c) in text.char_indices() {
        if c.is_ascii() {
            ascii += 1;
        } else {
            other += 1;
        }
        if other + ascii.div_ceil(4) > max_tokens {
            return &text[..idx];
        }
    }
    text
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trim passes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Index of the first message a trim pass may remove. A System message in
/// slot 0 is pinned.
fn first_evictable(history: &[Message]) -> usize {
    match history.first() {
        Some(first) if first.is_system() => 1,
        _ => 0,
    }
}

/// Length of the oldest turn after `start`: everything up to and including
/// the first Assistant message. The newest message is never part of it.
///
/// A question left unanswered by a failed turn joins the turn after it, so
/// eviction keeps User/Assistant pairs aligned. With no Assistant message in
/// range, the single oldest message is the unit.
fn oldest_turn_len(history: &[Message], start: usize) -> usize {
    let end = history.len().saturating_sub(1);
    if end <= start {
        return 0;
    }
    history[start..end]
        .iter()
        .position(|m| m.role == Role::Assistant)
        .map_or(1, |i| i + 1)
}

/// Bring `history` within `max_tokens`.
///
/// Drops the oldest turn after the pinned system slot until the estimate
/// fits, never dropping the newest message. If the pinned slot and the
/// newest message alone are still over, the newest message is truncated to
/// fit.
pub fn enforce_estimate(history: &mut Vec<Message>, max_tokens: usize) -> TrimOutcome {
    let start = first_evictable(history);
    let mut outcome = TrimOutcome::default();

    while estimate_history(history) > max_tokens {
        let n = oldest_turn_len(history, start);
        if n == 0 {
            break;
        }
        history.drain(start..start + n);
        outcome.removed += n;
    }

    if estimate_history(history) > max_tokens {
        if let Some((last, rest)) = history.split_last_mut() {
            let fixed = estimate_history(rest);
            let allowance = max_tokens
                .saturating_sub(fixed)
                .saturating_sub(MESSAGE_OVERHEAD_TOKENS);
            let kept = truncate_to_tokens(&last.content, allowance).len();
            last.content.truncate(kept);
            outcome.truncated = true;
        }
    }

    outcome.estimated_tokens = estimate_history(history);
    outcome
}

/// Drop the oldest turn once, never the newest message. Used when the back
/// end reports the conversation is over its limit.
pub fn drop_oldest_turn(history: &mut Vec<Message>) -> TrimOutcome {
    let start = first_evictable(history);
    let n = oldest_turn_len(history, start);
    history.drain(start..start + n);
    TrimOutcome {
        removed: n,
        truncated: false,
        estimated_tokens: estimate_history(history),
    }
}

/// Cap a system prompt at half the budget so a prompt plus one message
/// always fits.
pub fn cap_prompt(prompt: &str, max_tokens: usize) -> String {
    let allowance = (max_tokens / 2).saturating_sub(MESSAGE_OVERHEAD_TOKENS);
    truncate_to_tokens(prompt, allowance).to_string()
}
