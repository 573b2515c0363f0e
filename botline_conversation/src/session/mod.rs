//! The conversation session state machine.

use std::sync::{Arc, Weak};
use std::time::Duration;

use botline_core::{
    Activity, CallContext, Error, EventHub, EventKind, Identity, OutgoingActivity, SessionConfig,
    SessionEvent, SubscriptionId, Transport, retry_with_backoff,
};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, error, info, warn};


/// Coarse view of where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No conversation has been established.
    Disconnected,
    /// A create handshake is in progress.
    Connecting,
    /// Connected and the poll timer is running.
    Polling,
    /// Connected but the poll timer is stopped.
    Stopped,
}

#[derive(Default)]
struct State {
    conversation_id: Option<String>,
    token: Option<String>,
    token_expiry: Option<DateTime<Utc>>,
    /// Opaque cursor; `None` reads from the start of the stream.
    watermark: Option<String>,
    connecting: bool,
    /// Gate for surfacing polled messages. See `poll`.
    has_sent_message: bool,
    poller: Option<JoinHandle<()>>,
}

struct Inner<T> {
    transport: T,
    identity: Identity,
    config: SessionConfig,
    state: Mutex<State>,
    events: EventHub,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(poller) = self.state.get_mut().poller.take() {
            poller.abort();
        }
    }
}

/// Handle to one remote conversation.
///
/// Clones share the same conversation. Operations return immediately; the
/// HTTP work runs on the tokio runtime, so every method that talks to the
/// service must be called from within one.
pub struct ConversationSession<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ConversationSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ConversationSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConversationSession")
            .field("user_id", &self.inner.identity.user_id)
            .field("conversation_id", &state.conversation_id)
            .field("watermark", &state.watermark)
            .field("polling", &state.poller.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> ConversationSession<T> {
    #[must_use]
    pub fn new(transport: T, identity: Identity, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                identity,
                config,
                state: Mutex::new(State::default()),
                events: EventHub::new(),
            }),
        }
    }

    /// Seed the session with a conversation that already exists.
    ///
    /// No token comes with it, so nothing is sent or polled until a
    /// handshake assigns one.
    #[must_use]
    pub fn with_conversation_id(self, conversation_id: impl Into<String>) -> Self {
        self.inner.state.lock().conversation_id = Some(conversation_id.into());
        self
    }

    /// Start the creation handshake in the background.
    ///
    /// On success the conversation id and token are replaced, the watermark
    /// is reset, `connected` is emitted and polling starts. Failed attempts
    /// are retried per [`SessionConfig::create_policy`] and then only logged.
    /// The returned handle may be awaited or dropped.
    pub fn create(&self) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move { session.handshake().await })
    }

    /// Send a message authored by the local user in the background.
    ///
    /// Without a conversation and token the message is dropped with a
    /// warning. Otherwise the first-message gate opens before the send is
    /// dispatched. Delivery failures are logged, never returned.
    pub fn send_message(&self, text: impl Into<String>) -> JoinHandle<()> {
        let text = text.into();
        let target = {
            let mut state = self.inner.state.lock();
            match (state.conversation_id.clone(), state.token.clone()) {
                (Some(conversation_id), Some(token)) => {
                    state.has_sent_message = true;
                    Some((conversation_id, token))
                }
                _ => None,
            }
        };

        let dispatched = target.is_some();
        let session = self.clone();
        let handle = tokio::spawn(async move {
            let Some((conversation_id, token)) = target else {
                warn!("Dropping outgoing message: {}", Error::NotConnected);
                return;
            };
            session.deliver(conversation_id, token, text).await;
        });

        if dispatched && self.inner.config.restart_polling_on_send && self.is_polling() {
            self.start_polling();
        }
        handle
    }

    /// Cancel the poll timer. No-op, and no `stopped`, when it isn't running.
    ///
    /// A poll request already in flight is left to finish.
    pub fn stop_polling(&self) {
        let poller = self.inner.state.lock().poller.take();
        if let Some(poller) = poller {
            poller.abort();
            info!("Polling stopped");
            self.inner.events.emit(&SessionEvent::Stopped);
        }
    }

    /// Replace any running poll timer with a fresh one and emit `started`.
    ///
    /// When a timer was running, `stopped` is emitted first.
    pub fn start_polling(&self) {
        let period = self.inner.config.poll_interval();
        let weak = Arc::downgrade(&self.inner);

        let previous = {
            let mut state = self.inner.state.lock();
            let previous = state.poller.take();
            if let Some(previous) = &previous {
                previous.abort();
            }
            state.poller = Some(tokio::spawn(run_poller(weak, period)));
            previous
        };

        if previous.is_some() {
            info!("Polling stopped");
            self.inner.events.emit(&SessionEvent::Stopped);
        }
        info!("Polling started every {}ms", period.as_millis());
        self.inner.events.emit(&SessionEvent::Started);
    }

    /// Run `callback` once the session is connected.
    ///
    /// Runs it right away when a conversation id is already set. Otherwise it
    /// runs once, on the next `connected`, after `delay` if one is given.
    pub fn when_connected<F>(&self, callback: F, delay: Option<Duration>)
    where
        F: FnOnce() + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Some(callback)));

        let pending = Arc::clone(&slot);
        let id = self.inner.events.once(EventKind::Connected, move |_| {
            let Some(callback) = pending.lock().take() else {
                return;
            };
            match delay {
                Some(delay) if !delay.is_zero() => {
                    tokio::spawn(async move {
                        sleep(delay).await;
                        callback();
                    });
                }
                _ => callback(),
            }
        });

        // Registered before checking so a handshake finishing in between
        // can't slip past both paths.
        if self.is_connected() {
            self.inner.events.off(id);
            let callback = slot.lock().take();
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    pub fn on_connected<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.on(EventKind::Connected, move |_| handler())
    }

    pub fn on_started<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.on(EventKind::Started, move |_| handler())
    }

    pub fn on_stopped<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.on(EventKind::Stopped, move |_| handler())
    }

    /// Subscribe to incoming messages with their text and full activity.
    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&str, &Activity) + Send + Sync + 'static,
    {
        self.inner.events.on(EventKind::Message, move |event| {
            if let SessionEvent::Message { text, activity } = event {
                handler(text, activity);
            }
        })
    }

    async fn handshake(&self) {
        let token = {
            let mut state = self.inner.state.lock();
            state.connecting = true;
            state.token.clone()
        };
        let ctx = self.call_context(token);
        let policy = self.inner.config.create_policy();

        info!("Creating conversation as user '{}'", ctx.user_id);
        let result = retry_with_backoff(
            "Create conversation",
            || self.inner.transport.start_conversation(&ctx),
            &policy,
        )
        .await;

        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                self.inner.state.lock().connecting = false;
                error!(
                    "Failed to create conversation after {} attempts: {e}",
                    policy.attempts.max(1)
                );
                return;
            }
        };

        let token_expiry = grant
            .expires_in
            .and_then(|secs| TimeDelta::try_seconds(i64::try_from(secs).ok()?))
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));

        {
            let mut state = self.inner.state.lock();
            state.conversation_id = Some(grant.conversation_id.clone());
            state.token = Some(grant.token);
            state.token_expiry = token_expiry;
            state.watermark = None;
            state.connecting = false;
        }

        info!("Connected to conversation {}", grant.conversation_id);
        self.inner.events.emit(&SessionEvent::Connected);
        self.start_polling();
    }

    async fn deliver(&self, conversation_id: String, token: String, text: String) {
        let ctx = self.call_context(Some(token));
        let activity = OutgoingActivity::message(text, self.inner.identity.account());
        let policy = self.inner.config.send_policy();

        let result = retry_with_backoff(
            "Send message",
            || {
                self.inner
                    .transport
                    .post_activity(&ctx, &conversation_id, &activity)
            },
            &policy,
        )
        .await;

        match result {
            Ok(()) => debug!("Message delivered to conversation {conversation_id}"),
            Err(e) => error!("Failed to send message to conversation {conversation_id}: {e}"),
        }
    }

    /// One poll round trip.
    ///
    /// Polled messages are only surfaced once the local user has sent
    /// something, which keeps old history quiet after a reconnect but also
    /// drops a bot's unsolicited greeting. Our own echoed messages are never
    /// surfaced.
    ///
    /// Ticks may overlap when a request outlives the interval. A response is
    /// only applied if the watermark it was requested with is still current;
    /// anything else is stale and dropped whole.
    async fn poll(&self) {
        let (conversation_id, token, base) = {
            let state = self.inner.state.lock();
            let (Some(conversation_id), Some(token)) =
                (state.conversation_id.clone(), state.token.clone())
            else {
                debug!("Skipping poll: {}", Error::NotConnected);
                return;
            };
            (conversation_id, token, state.watermark.clone())
        };

        let ctx = self.call_context(Some(token));
        let policy = self.inner.config.poll_policy();
        let result = retry_with_backoff(
            "Poll activities",
            || {
                self.inner
                    .transport
                    .get_activities(&ctx, &conversation_id, base.as_deref())
            },
            &policy,
        )
        .await;

        let set = match result {
            Ok(set) => set,
            Err(e) => {
                warn!("Polling conversation {conversation_id} failed: {e}");
                return;
            }
        };

        let user_id = &self.inner.identity.user_id;
        let deliver = {
            let mut state = self.inner.state.lock();
            if state.conversation_id.as_deref() != Some(conversation_id.as_str())
                || state.watermark != base
            {
                debug!(
                    "Discarding stale poll response (requested at {:?}, now at {:?})",
                    base, state.watermark
                );
                return;
            }
            if set.watermark.is_some() {
                state.watermark = set.watermark;
            }

            let mut deliver = Vec::new();
            for activity in set.activities {
                if !activity.is_message() {
                    debug!("Unhandled activity type '{}'", activity.kind);
                    continue;
                }
                if &activity.from.id == user_id {
                    continue;
                }
                if !state.has_sent_message {
                    debug!("Ignoring message from '{}' before first send", activity.from.id);
                    continue;
                }
                deliver.push(activity);
            }
            deliver
        };

        for activity in deliver {
            let text = activity.text().to_string();
            debug!("Message from '{}': {text}", activity.from.id);
            self.inner
                .events
                .emit(&SessionEvent::Message { text, activity });
        }
    }

    fn call_context(&self, token: Option<String>) -> CallContext {
        CallContext::new(self.inner.identity.user_id.clone(), token)
    }
}

impl<T> ConversationSession<T> {
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Direct access to the notification table.
    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<String> {
        self.inner.state.lock().conversation_id.clone()
    }

    /// Advisory only; the session never acts on it.
    #[must_use]
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().token_expiry
    }

    #[must_use]
    pub fn watermark(&self) -> Option<String> {
        self.inner.state.lock().watermark.clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().conversation_id.is_some()
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner.state.lock().poller.is_some()
    }

    #[must_use]
    pub fn has_sent_message(&self) -> bool {
        self.inner.state.lock().has_sent_message
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let state = self.inner.state.lock();
        if state.connecting {
            SessionStatus::Connecting
        } else if state.conversation_id.is_none() {
            SessionStatus::Disconnected
        } else if state.poller.is_some() {
            SessionStatus::Polling
        } else {
            SessionStatus::Stopped
        }
    }
}

/// Repeating timer: one poll per tick, first tick one period after start.
///
/// Holds only a weak reference so an abandoned session isn't kept alive.
async fn run_poller<T: Transport + 'static>(session: Weak<Inner<T>>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = session.upgrade() else {
            break;
        };
        let session = ConversationSession { inner };
        tokio::spawn(async move { session.poll().await });
    }
}
