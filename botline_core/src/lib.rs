#![deny(
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

//! Shared building blocks for botline: the wire data model, the
//! `Transport` seam, the error taxonomy, the event hub and retry policy.

use async_trait::async_trait;

pub mod activity;
pub mod error;
pub mod events;
pub mod retry;
pub mod settings;
pub mod wire;

pub use activity::{
    Activity, ActivitySet, Attachment, Card, CardAction, CardImage, CardKind, ChannelAccount,
    ConversationAccount, ConversationGrant, OutgoingActivity, MESSAGE_TYPE,
};
pub use error::{Error, Result};
pub use events::{EventHub, EventKind, SessionEvent, SubscriptionId};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use settings::{Identity, SessionConfig};

/// Per-call credentials sent alongside the transport's shared secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Local user id, sent as the `UserId` cookie
    pub user_id: String,
    /// Conversation-scoped token, `None` before the first handshake
    pub token: Option<String>,
}

impl CallContext {
    #[must_use]
    pub fn new(user_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token,
        }
    }

    /// Value of the `token` header; empty until a token is assigned.
    #[must_use]
    pub fn token_header(&self) -> &str {
        self.token.as_deref().unwrap_or("")
    }
}

/// The HTTP surface of the remote bot service.
///
/// `ConversationSession` only talks to the service through this trait, so it
/// can be driven by a scripted transport in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST /conversations`
    async fn start_conversation(&self, ctx: &CallContext) -> Result<ConversationGrant>;

    /// `POST /conversations/{id}/activities`
    async fn post_activity(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
        activity: &OutgoingActivity,
    ) -> Result<()>;

    /// `GET /conversations/{id}/activities?watermark=...`
    async fn get_activities(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<ActivitySet>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn start_conversation(&self, ctx: &CallContext) -> Result<ConversationGrant> {
        (**self).start_conversation(ctx).await
    }

    async fn post_activity(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
        activity: &OutgoingActivity,
    ) -> Result<()> {
        (**self).post_activity(ctx, conversation_id, activity).await
    }

    async fn get_activities(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<ActivitySet> {
        (**self)
            .get_activities(ctx, conversation_id, watermark)
            .await
    }
}
