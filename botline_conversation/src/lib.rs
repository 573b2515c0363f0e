#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Client side of a single remote bot conversation.
//!
//! A [`ConversationSession`] performs the creation handshake, polls the
//! service for new activities on a repeating timer, sends the local user's
//! messages and reports what happens through named notifications.
//!
//! # Lifecycle
//! - `Disconnected` until [`ConversationSession::create`] succeeds
//! - `Polling` right after the handshake
//! - `Stopped` after [`ConversationSession::stop_polling`]; the conversation
//!   and token are kept, so sending still works and polling can resume
//!
//! Failures never reach the caller. They are retried as configured and then
//! logged.

mod session;

pub use session::{ConversationSession, SessionStatus};
