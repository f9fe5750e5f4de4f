//! Shared types for the chatbridge crates: conversation messages, users and
//! platforms, token usage, configuration, errors, and structured trace events.

pub mod config;
pub mod error;
pub mod message;
pub mod stream;
pub mod trace;
pub mod user;

pub use error::{Error, Result};
pub use message::{Message, Role};
pub use stream::{ChatAnswer, Usage};
pub use user::{Platform, User};
