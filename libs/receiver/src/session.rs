//! Notification session facade.

use std::sync::Arc;

use notecast_id::{Identity, NotificationId};
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::{
    Clock, Notification, NotificationStore, ReactionDispatcher, ReceiverConfig, RefreshSignal,
    SessionError, SubscriptionManager, SystemClock, TransportReady,
};

/// Everything one observer needs: subscriptions, reactions and the
/// notification list.
///
/// ```ignore
/// let (provider, ready) = transport_slot();
/// let mut session = NotificationSession::new(ReceiverConfig::from_env()?, ready);
/// provider.provide(transport);
/// session.start(Some(Identity::from(42i64))).await?;
///
/// let mut changes = session.notifications();
/// while changes.changed().await.is_ok() {
///     render(&changes.borrow_and_update());
/// }
/// ```
pub struct NotificationSession {
    subscriptions: SubscriptionManager,
    dispatcher: ReactionDispatcher,
}

impl NotificationSession {
    pub fn new(config: ReceiverConfig, ready: TransportReady) -> Self {
        Self::with_clock(config, ready, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ReceiverConfig, ready: TransportReady, clock: Arc<dyn Clock>) -> Self {
        let store = NotificationStore::with_clock(config.store, clock);
        let (refresh, _) = broadcast::channel(config.refresh_capacity.max(1));
        let identity = watch::Sender::new(None);
        let dispatcher = ReactionDispatcher::new(
            store,
            refresh,
            config.suppress_own_notes,
            identity.subscribe(),
        );
        let subscriptions = SubscriptionManager::with_identity(
            config.plan,
            dispatcher.clone().into_handler(),
            ready,
            identity,
        );

        Self {
            subscriptions,
            dispatcher,
        }
    }

    /// Waits for the transport and subscribes.
    pub async fn start(&mut self, identity: Option<Identity>) -> Result<(), SessionError> {
        self.subscriptions.start(identity).await
    }

    /// Follows a sign-in, sign-out or account switch.
    pub fn set_identity(&mut self, identity: Option<Identity>) -> Result<(), SessionError> {
        self.subscriptions.set_identity(identity)
    }

    /// Closes every channel and drops all notifications with their timers.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.subscriptions.teardown();
        self.dispatcher.store().clear();
        info!("Notification session shut down");
    }

    /// Snapshots of the notification list, pushed after every change.
    pub fn notifications(&self) -> watch::Receiver<Vec<Notification>> {
        self.dispatcher.store().subscribe()
    }

    /// Notifications currently on display, oldest first.
    pub fn active_notifications(&self) -> Vec<Notification> {
        self.dispatcher.store().active()
    }

    pub fn dismiss(&self, id: NotificationId) -> bool {
        self.dispatcher.store().remove(id)
    }

    pub fn dismiss_all(&self) {
        self.dispatcher.store().clear();
    }

    /// Signals to reload cached note lists.
    pub fn refresh_signals(&self) -> broadcast::Receiver<RefreshSignal> {
        self.dispatcher.refresh_signals()
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// For attaching extra handlers to open channels.
    pub fn subscriptions_mut(&mut self) -> &mut SubscriptionManager {
        &mut self.subscriptions
    }

    pub fn store(&self) -> &NotificationStore {
        self.dispatcher.store()
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        self.subscriptions.teardown();
        self.dispatcher.store().clear();
    }
}
