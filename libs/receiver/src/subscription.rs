//! Subscription manager.
//!
//! Owns every channel a session listens on. Lifecycle:
//!
//! ```text
//! Uninitialized -> Subscribing -> Active -> TearingDown -> Uninitialized
//!                                  |  ^
//!                   identity change v  | (private channel swapped)
//!                           TearingDown -> Subscribing
//! ```
//!
//! Every channel is opened at most once. Handlers registered on a channel are
//! switched off before the channel is closed, so a late delivery from the
//! transport never reaches a torn-down handler.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use notecast_events::{
    channels, event_names, private_channel_name, ChannelKind, ChannelSelector, WireMessage,
};
use notecast_id::Identity;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::{ChannelHandle, HandlerError, SessionError, Transport, TransportReady};

/// Handler invoked with each message delivered on a channel.
pub type EventHandler =
    Arc<dyn Fn(&DeliveryContext, &WireMessage) -> Result<(), HandlerError> + Send + Sync>;

/// Where a message came from, fixed when its handler was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryContext {
    pub channel: String,
    pub kind: ChannelKind,
    /// Identity the session had when this channel was opened. Public
    /// channels outlive identity changes, so this may be stale; use
    /// [`SubscriptionManager::identity_changes`] for the current one.
    pub identity: Option<Identity>,
}

/// Lifecycle state of a [`SubscriptionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Uninitialized,
    Subscribing,
    Active,
    TearingDown,
}

/// Which channels a session opens and which events it routes on each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    /// Identity-independent channels.
    pub public: Vec<String>,

    /// Base of the per-identity channel; `None` disables private channels.
    pub private_base: Option<String>,

    /// Event names routed to the session handler on every channel.
    pub events: Vec<String>,
}

impl Default for ChannelPlan {
    fn default() -> Self {
        Self {
            public: vec![
                channels::NOTIFICATIONS.to_string(),
                channels::NOTES.to_string(),
            ],
            private_base: Some(channels::NOTIFICATIONS.to_string()),
            events: event_names::ALL.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ChannelPlan {
    fn private_selector(&self, identity: Option<&Identity>) -> Option<ChannelSelector> {
        match (&self.private_base, identity) {
            (Some(base), Some(identity)) => {
                Some(ChannelSelector::private(base.clone(), identity.clone()))
            }
            _ => None,
        }
    }
}

type HandlerSlot = Arc<Mutex<EventHandler>>;

struct Subscription {
    context: DeliveryContext,
    handle: Box<dyn ChannelHandle>,
    live: Arc<AtomicBool>,
    slots: HashMap<String, HandlerSlot>,
}

impl Subscription {
    fn attach(&mut self, event_name: &str, handler: EventHandler) {
        if let Some(slot) = self.slots.get(event_name) {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = handler;
            debug!(
                channel = %self.context.channel,
                event_name,
                "Replaced handler"
            );
            return;
        }

        let slot: HandlerSlot = Arc::new(Mutex::new(handler));
        self.handle.on(
            event_name,
            guarded(
                event_name.to_string(),
                self.context.clone(),
                self.live.clone(),
                slot.clone(),
            ),
        );
        self.slots.insert(event_name.to_string(), slot);
    }
}

/// Wraps a handler slot so the transport only ever sees an infallible,
/// panic-free callback that goes inert once its channel is closed.
fn guarded(
    event_name: String,
    context: DeliveryContext,
    live: Arc<AtomicBool>,
    slot: HandlerSlot,
) -> crate::RawHandler {
    Arc::new(move |payload: &serde_json::Value| {
        if !live.load(Ordering::SeqCst) {
            debug!(
                channel = %context.channel,
                event_name = %event_name,
                "Dropping delivery for closed channel"
            );
            return;
        }

        let handler = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let message = WireMessage::new(event_name.clone(), payload.clone());

        match panic::catch_unwind(AssertUnwindSafe(|| handler(&context, &message))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                error = %e,
                channel = %context.channel,
                event_name = %event_name,
                "Handler failed"
            ),
            Err(_) => warn!(
                channel = %context.channel,
                event_name = %event_name,
                "Handler panicked"
            ),
        }
    })
}

/// Owns the channel subscriptions of one session.
pub struct SubscriptionManager {
    plan: ChannelPlan,
    route: EventHandler,
    ready: TransportReady,
    transport: Option<Arc<dyn Transport>>,
    identity: watch::Sender<Option<Identity>>,
    state: SubscriptionState,
    subscriptions: BTreeMap<String, Subscription>,
}

impl SubscriptionManager {
    /// Creates an idle manager. `route` is attached for every planned event
    /// on every channel the manager opens.
    pub fn new(plan: ChannelPlan, route: EventHandler, ready: TransportReady) -> Self {
        Self::with_identity(plan, route, ready, watch::Sender::new(None))
    }

    /// Like [`SubscriptionManager::new`], publishing identity changes on
    /// `identity`.
    pub fn with_identity(
        plan: ChannelPlan,
        route: EventHandler,
        ready: TransportReady,
        identity: watch::Sender<Option<Identity>>,
    ) -> Self {
        Self {
            plan,
            route,
            ready,
            transport: None,
            identity,
            state: SubscriptionState::Uninitialized,
            subscriptions: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// The current identity, updated on every change.
    pub fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Names of the open channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        self.subscriptions.keys().cloned().collect()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.contains_key(channel)
    }

    /// Name of the private channel for the current identity, if any.
    pub fn private_channel(&self) -> Option<String> {
        match (&self.plan.private_base, self.identity.borrow().as_ref()) {
            (Some(base), Some(identity)) => Some(private_channel_name(base, identity)),
            _ => None,
        }
    }

    /// Waits for the transport, then opens every planned channel.
    ///
    /// Calling `start` on a manager that is already active is a no-op. If a
    /// channel cannot be opened, the ones already opened are closed again and
    /// the manager returns to `Uninitialized`. Nothing changes until the
    /// transport is ready, so a `start` future dropped while waiting leaves
    /// the manager as it was.
    #[instrument(skip(self))]
    pub async fn start(&mut self, identity: Option<Identity>) -> Result<(), SessionError> {
        if self.state != SubscriptionState::Uninitialized {
            debug!(state = ?self.state, "Subscription manager already started");
            return Ok(());
        }

        let transport = self.ready.wait().await?;

        self.transport = Some(transport);
        self.identity.send_replace(identity);
        self.state = SubscriptionState::Subscribing;

        let mut selectors: Vec<ChannelSelector> = self
            .plan
            .public
            .iter()
            .map(ChannelSelector::public)
            .collect();
        selectors.extend(self.plan.private_selector(self.identity.borrow().as_ref()));

        for selector in selectors {
            if let Err(e) = self.open(&selector) {
                warn!(error = %e, channel = %selector.name(), "Failed to open channel");
                self.teardown();
                return Err(e);
            }
        }

        self.state = SubscriptionState::Active;
        info!(channels = ?self.channels(), "Subscriptions active");
        Ok(())
    }

    /// Reconciles the private channel with a new identity.
    ///
    /// Public channels are left alone. Before `start`, the identity is only
    /// recorded. If the new private channel cannot be opened the manager
    /// stays active on its public channels and the error is returned;
    /// calling again with the same identity retries the private channel.
    #[instrument(skip_all, fields(from = ?self.identity(), to = ?identity))]
    pub fn set_identity(&mut self, identity: Option<Identity>) -> Result<(), SessionError> {
        if self.state != SubscriptionState::Active {
            self.identity.send_replace(identity);
            return Ok(());
        }

        let unchanged = identity == *self.identity.borrow();
        if unchanged && self.private_channel_open() {
            return Ok(());
        }

        self.state = SubscriptionState::TearingDown;
        if let Some(old) = self.private_channel() {
            if let Some(subscription) = self.subscriptions.remove(&old) {
                self.close(subscription);
            }
        }

        self.identity.send_replace(identity);
        self.state = SubscriptionState::Subscribing;

        let selector = self.plan.private_selector(self.identity.borrow().as_ref());
        let result = match selector {
            Some(selector) => self.open(&selector),
            None => Ok(()),
        };

        self.state = SubscriptionState::Active;
        info!(channels = ?self.channels(), "Identity reconciled");
        result
    }

    fn private_channel_open(&self) -> bool {
        self.private_channel()
            .map_or(true, |channel| self.subscriptions.contains_key(&channel))
    }

    /// Registers `handler` for `event_name` on an open channel, replacing any
    /// handler previously attached to the same pair.
    pub fn attach(
        &mut self,
        channel: &str,
        event_name: &str,
        handler: EventHandler,
    ) -> Result<(), SessionError> {
        let subscription = self
            .subscriptions
            .get_mut(channel)
            .ok_or_else(|| SessionError::NotSubscribed(channel.to_string()))?;
        subscription.attach(event_name, handler);
        Ok(())
    }

    /// Closes every open channel exactly once. Repeated calls do nothing.
    pub fn teardown(&mut self) {
        if self.state == SubscriptionState::Uninitialized && self.subscriptions.is_empty() {
            return;
        }

        self.state = SubscriptionState::TearingDown;
        let subscriptions = std::mem::take(&mut self.subscriptions);
        let count = subscriptions.len();
        for subscription in subscriptions.into_values() {
            self.close(subscription);
        }
        self.transport = None;
        self.state = SubscriptionState::Uninitialized;
        info!(closed = count, "Subscriptions torn down");
    }

    fn open(&mut self, selector: &ChannelSelector) -> Result<(), SessionError> {
        let name = selector.name();
        if self.subscriptions.contains_key(&name) {
            debug!(channel = %name, "Already subscribed");
            return Ok(());
        }

        let transport = self
            .transport
            .as_ref()
            .ok_or(SessionError::TransportDropped)?;

        let handle =
            transport
                .subscribe(selector.kind(), &name)
                .map_err(|source| SessionError::Subscribe {
                    channel: name.clone(),
                    source,
                })?;

        let mut subscription = Subscription {
            context: DeliveryContext {
                channel: name.clone(),
                kind: selector.kind(),
                identity: self.identity.borrow().clone(),
            },
            handle,
            live: Arc::new(AtomicBool::new(true)),
            slots: HashMap::new(),
        };
        for event_name in &self.plan.events {
            subscription.attach(event_name, self.route.clone());
        }

        info!(channel = %name, kind = %selector.kind(), "Subscribed");
        self.subscriptions.insert(name, subscription);
        Ok(())
    }

    fn close(&self, subscription: Subscription) {
        subscription.live.store(false, Ordering::SeqCst);
        if let Some(transport) = &self.transport {
            transport.unsubscribe(&subscription.context.channel);
        }
        info!(channel = %subscription.context.channel, "Unsubscribed");
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::fake::FakeTransport;

    fn counting_route() -> (EventHandler, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let route: EventHandler = Arc::new(move |_ctx, _msg| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (route, count)
    }

    fn manager(transport: Arc<FakeTransport>, route: EventHandler) -> SubscriptionManager {
        SubscriptionManager::new(
            ChannelPlan::default(),
            route,
            TransportReady::ready(transport),
        )
    }

    #[tokio::test]
    async fn test_start_without_identity_opens_public_only() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        mgr.start(None).await.unwrap();

        assert_eq!(mgr.state(), SubscriptionState::Active);
        assert_eq!(mgr.channels(), vec!["notes", "notifications"]);
        assert!(mgr.private_channel().is_none());
    }

    #[tokio::test]
    async fn test_start_with_identity_opens_private() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        mgr.start(Some(Identity::from(42i64))).await.unwrap();

        assert!(mgr.is_subscribed("notifications.42"));
        assert_eq!(transport.registrations("notifications.42", "note.created"), 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        mgr.start(None).await.unwrap();
        mgr.start(None).await.unwrap();

        assert_eq!(transport.log(), vec!["+notifications", "+notes"]);
    }

    #[tokio::test]
    async fn test_identity_change_swaps_private_channel_only() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        mgr.start(Some(Identity::from(42i64))).await.unwrap();
        mgr.set_identity(Some(Identity::from(43i64))).unwrap();
        mgr.set_identity(Some(Identity::from(43i64))).unwrap();

        assert_eq!(
            transport.log(),
            vec![
                "+notifications",
                "+notes",
                "+notifications.42",
                "-notifications.42",
                "+notifications.43",
            ]
        );
        assert_eq!(mgr.state(), SubscriptionState::Active);
    }

    #[tokio::test]
    async fn test_identity_cleared_keeps_public() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        mgr.start(Some(Identity::from(1i64))).await.unwrap();
        mgr.set_identity(None).unwrap();

        assert_eq!(mgr.channels(), vec!["notes", "notifications"]);
    }

    #[tokio::test]
    async fn test_identity_before_start_is_recorded() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        mgr.set_identity(Some(Identity::from(9i64))).unwrap();
        assert!(transport.log().is_empty());
        assert_eq!(mgr.private_channel().as_deref(), Some("notifications.9"));
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        mgr.start(Some(Identity::from(42i64))).await.unwrap();
        mgr.teardown();
        let after_first = transport.log();
        mgr.teardown();

        assert_eq!(after_first, transport.log());
        assert_eq!(after_first.iter().filter(|l| l.starts_with('-')).count(), 3);
        assert_eq!(mgr.state(), SubscriptionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_stale_handlers_are_inert_after_close() {
        let transport = Arc::new(FakeTransport::default());
        let (route, count) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        mgr.start(Some(Identity::from(42i64))).await.unwrap();
        mgr.set_identity(Some(Identity::from(43i64))).unwrap();

        // The fake keeps old handlers around like a transport whose close is
        // still in flight.
        transport.deliver("notifications.42", "notification.sent", serde_json::json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        transport.deliver("notifications.43", "notification.sent", serde_json::json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attach_replaces_rather_than_duplicates() {
        let transport = Arc::new(FakeTransport::default());
        let (route, original) = counting_route();
        let mut mgr = manager(transport.clone(), route);
        mgr.start(None).await.unwrap();

        let (replacement, replaced) = counting_route();
        mgr.attach("notes", "note.created", replacement.clone()).unwrap();
        mgr.attach("notes", "note.created", replacement).unwrap();

        transport.deliver("notes", "note.created", serde_json::json!({}));

        assert_eq!(transport.registrations("notes", "note.created"), 1);
        assert_eq!(original.load(Ordering::SeqCst), 0);
        assert_eq!(replaced.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attach_requires_subscription() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport, route.clone());

        assert_eq!(
            mgr.attach("notes", "note.created", route),
            Err(SessionError::NotSubscribed("notes".to_string()))
        );
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_delivery() {
        let transport = Arc::new(FakeTransport::default());
        let (route, count) = counting_route();
        let mut mgr = manager(transport.clone(), route);
        mgr.start(None).await.unwrap();

        let failing: EventHandler =
            Arc::new(|_ctx, _msg| Err(HandlerError::Failed("boom".to_string())));
        let panicking: EventHandler = Arc::new(|_ctx, _msg| panic!("handler bug"));
        mgr.attach("notes", "note.created", failing).unwrap();
        mgr.attach("notifications", "note.created", panicking).unwrap();

        transport.deliver("notes", "note.created", serde_json::json!({}));
        transport.deliver("notifications", "note.created", serde_json::json!({}));
        transport.deliver("notes", "notification.sent", serde_json::json!({}));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(mgr.is_subscribed("notes"));
    }

    #[tokio::test]
    async fn test_context_carries_identity_at_registration() {
        let transport = Arc::new(FakeTransport::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let route: EventHandler = Arc::new(move |ctx: &DeliveryContext, _msg: &WireMessage| {
            sink.lock().unwrap().push(ctx.clone());
            Ok(())
        });
        let mut mgr = manager(transport.clone(), route);

        mgr.start(Some(Identity::from(42i64))).await.unwrap();
        transport.deliver("notifications.42", "notification.sent", serde_json::json!({}));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, ChannelKind::Private);
        assert_eq!(seen[0].identity, Some(Identity::from(42i64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_cancelled_while_waiting_can_start_again() {
        let (provider, ready) = crate::transport_slot();
        let (route, _) = counting_route();
        let mut mgr = SubscriptionManager::new(ChannelPlan::default(), route, ready);

        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), mgr.start(None)).await;
        assert!(waited.is_err());
        assert_eq!(mgr.state(), SubscriptionState::Uninitialized);

        let transport = Arc::new(FakeTransport::default());
        provider.provide(transport.clone());
        mgr.start(None).await.unwrap();

        assert_eq!(mgr.state(), SubscriptionState::Active);
        assert_eq!(mgr.channels(), vec!["notes", "notifications"]);
        assert_eq!(transport.log(), vec!["+notifications", "+notes"]);
    }

    #[tokio::test]
    async fn test_refused_identity_swap_can_be_retried() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);
        mgr.start(Some(Identity::from(42i64))).await.unwrap();

        *transport.refuse.lock().unwrap() = Some("notifications.43".to_string());
        let err = mgr.set_identity(Some(Identity::from(43i64))).unwrap_err();
        assert!(matches!(err, SessionError::Subscribe { .. }));
        assert_eq!(mgr.state(), SubscriptionState::Active);
        assert!(!mgr.is_subscribed("notifications.43"));

        *transport.refuse.lock().unwrap() = None;
        mgr.set_identity(Some(Identity::from(43i64))).unwrap();

        assert_eq!(
            mgr.channels(),
            vec!["notes", "notifications", "notifications.43"]
        );
        mgr.set_identity(Some(Identity::from(43i64))).unwrap();
        assert_eq!(transport.registrations("notifications.43", "note.created"), 1);
    }

    #[tokio::test]
    async fn test_identity_changes_follow_current_identity() {
        let transport = Arc::new(FakeTransport::default());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);
        let current = mgr.identity_changes();

        mgr.start(Some(Identity::from(42i64))).await.unwrap();
        assert_eq!(*current.borrow(), Some(Identity::from(42i64)));

        mgr.set_identity(Some(Identity::from(43i64))).unwrap();
        assert_eq!(*current.borrow(), Some(Identity::from(43i64)));
        assert_eq!(mgr.identity(), Some(Identity::from(43i64)));

        mgr.set_identity(None).unwrap();
        assert_eq!(*current.borrow(), None);
    }

    #[tokio::test]
    async fn test_refused_subscription_rolls_back() {
        let transport = Arc::new(FakeTransport::default());
        *transport.refuse.lock().unwrap() = Some("notifications.7".to_string());
        let (route, _) = counting_route();
        let mut mgr = manager(transport.clone(), route);

        let err = mgr.start(Some(Identity::from(7i64))).await.unwrap_err();

        assert!(matches!(err, SessionError::Subscribe { .. }));
        assert_eq!(mgr.state(), SubscriptionState::Uninitialized);
        assert!(mgr.channels().is_empty());
        assert_eq!(
            transport.log(),
            vec!["+notifications", "+notes", "-notes", "-notifications"]
        );
    }
}
