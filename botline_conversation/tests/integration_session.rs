//! End-to-end behaviour of a session against an in-memory bot.
//!
//! The bot echoes every message back with a `you said:` prefix on the next
//! poll, the way a simple echo bot behind the service would.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use botline_conversation::{ConversationSession, SessionStatus};
use botline_core::{
    Activity, ActivitySet, CallContext, ChannelAccount, ConversationGrant, Identity,
    OutgoingActivity, Result, SessionConfig, Transport,
};
use parking_lot::Mutex;

#[derive(Default)]
struct EchoBot {
    log: Mutex<Vec<Activity>>,
}

#[async_trait]
impl Transport for EchoBot {
    async fn start_conversation(&self, _ctx: &CallContext) -> Result<ConversationGrant> {
        self.log.lock().push(Activity {
            kind: "message".to_string(),
            text: Some("Welcome!".to_string()),
            from: ChannelAccount::new("echo-bot", "Echo"),
            ..Activity::default()
        });
        Ok(ConversationGrant {
            conversation_id: "conv-1".to_string(),
            token: "token-1".to_string(),
            expires_in: Some(1800),
        })
    }

    async fn post_activity(
        &self,
        _ctx: &CallContext,
        _conversation_id: &str,
        activity: &OutgoingActivity,
    ) -> Result<()> {
        let mut log = self.log.lock();
        log.push(Activity {
            kind: activity.kind.to_string(),
            text: Some(activity.text.clone()),
            from: activity.from.clone(),
            ..Activity::default()
        });
        log.push(Activity {
            kind: "message".to_string(),
            text: Some(format!("you said: {}", activity.text)),
            from: ChannelAccount::new("echo-bot", "Echo"),
            ..Activity::default()
        });
        Ok(())
    }

    async fn get_activities(
        &self,
        _ctx: &CallContext,
        _conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<ActivitySet> {
        let log = self.log.lock();
        let start = watermark
            .and_then(|w| w.parse::<usize>().ok())
            .unwrap_or(0)
            .min(log.len());
        Ok(ActivitySet {
            activities: log[start..].to_vec(),
            watermark: Some(log.len().to_string()),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_echo_conversation_round_trip() {
    let session = ConversationSession::new(
        Arc::new(EchoBot::default()),
        Identity::new("alice", "Alice"),
        SessionConfig::default().with_poll_interval(Duration::from_millis(200)),
    );

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    session.on_message(move |text, activity| {
        sink.lock().push((text.to_string(), activity.from.id.clone()));
    });

    let greeter = session.clone();
    session.when_connected(
        move || {
            greeter.send_message("ping");
        },
        Some(Duration::from_millis(500)),
    );

    session.create().await.expect("create task panicked");
    assert_eq!(session.status(), SessionStatus::Polling);

    tokio::time::sleep(Duration::from_secs(1)).await;

    // The welcome was polled before we spoke and our own message is never echoed.
    assert_eq!(
        *received.lock(),
        vec![("you said: ping".to_string(), "echo-bot".to_string())]
    );
    assert_eq!(session.watermark().as_deref(), Some("3"));

    session.stop_polling();
    assert_eq!(session.status(), SessionStatus::Stopped);
}
