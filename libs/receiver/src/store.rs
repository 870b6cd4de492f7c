//! Notification store.
//!
//! An ordered, bounded collection of in-flight notifications. Every entry
//! removes itself after the configured TTL through a one-shot tokio timer;
//! removing an entry early aborts its timer, so an expiry only ever removes
//! the entry it was scheduled for.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notecast_events::Severity;
use notecast_id::NotificationId;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Default time a notification stays visible.
pub const DEFAULT_TTL: Duration = Duration::from_millis(5000);

/// Default bound on retained notifications.
pub const DEFAULT_MAX_RETAINED: usize = 50;

/// Source of `received_at` timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A notification currently on display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub received_at: DateTime<Utc>,
}

/// Store limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Lifetime of each entry.
    pub ttl: Duration,

    /// Adding beyond this many entries evicts the oldest.
    pub max_retained: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_retained: DEFAULT_MAX_RETAINED,
        }
    }
}

struct Entry {
    notification: Notification,
    dedup_key: Option<String>,
    expiry: Option<AbortHandle>,
}

impl Entry {
    fn cancel(&self) {
        if let Some(expiry) = &self.expiry {
            expiry.abort();
        }
    }
}

struct Shared {
    entries: Mutex<VecDeque<Entry>>,
    changes: watch::Sender<Vec<Notification>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, entries: &VecDeque<Entry>) {
        let snapshot = entries.iter().map(|e| e.notification.clone()).collect();
        self.changes.send_replace(snapshot);
    }

    fn expire(&self, id: NotificationId) {
        let mut entries = self.lock();
        if let Some(pos) = entries.iter().position(|e| e.notification.id == id) {
            entries.remove(pos);
            debug!(notification_id = %id, "Notification expired");
            self.publish(&entries);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.iter() {
            entry.cancel();
        }
    }
}

/// Bounded, self-expiring notification queue.
///
/// Clones share the same entries. Changes are published as full snapshots
/// (oldest first) on a watch channel.
#[derive(Clone)]
pub struct NotificationStore {
    shared: Arc<Shared>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl NotificationStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(VecDeque::new()),
                changes,
            }),
            config,
            clock,
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// Appends a notification and schedules its expiry.
    pub fn add(&self, message: impl Into<String>, severity: Severity) -> NotificationId {
        let mut entries = self.shared.lock();
        self.push(&mut entries, message.into(), severity, None)
    }

    /// Like [`add`](Self::add), but returns `None` without touching the store
    /// when a live entry already carries `dedup_key`.
    pub fn add_unique(
        &self,
        message: impl Into<String>,
        severity: Severity,
        dedup_key: impl Into<String>,
    ) -> Option<NotificationId> {
        let dedup_key = dedup_key.into();
        let mut entries = self.shared.lock();

        if entries
            .iter()
            .any(|e| e.dedup_key.as_deref() == Some(dedup_key.as_str()))
        {
            debug!(dedup_key = %dedup_key, "Duplicate notification dropped");
            return None;
        }

        Some(self.push(&mut entries, message.into(), severity, Some(dedup_key)))
    }

    /// Removes a notification and cancels its expiry. Unknown ids return
    /// `false`.
    pub fn remove(&self, id: NotificationId) -> bool {
        let mut entries = self.shared.lock();
        let Some(pos) = entries.iter().position(|e| e.notification.id == id) else {
            return false;
        };

        if let Some(entry) = entries.remove(pos) {
            entry.cancel();
        }
        self.shared.publish(&entries);
        true
    }

    /// Removes everything and cancels all pending expiries.
    pub fn clear(&self) {
        let mut entries = self.shared.lock();
        for entry in entries.drain(..) {
            entry.cancel();
        }
        self.shared.publish(&entries);
    }

    /// Current notifications, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        self.shared
            .lock()
            .iter()
            .map(|e| e.notification.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty()
    }

    /// Receiver of snapshots taken after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.shared.changes.subscribe()
    }

    fn push(
        &self,
        entries: &mut VecDeque<Entry>,
        message: String,
        severity: Severity,
        dedup_key: Option<String>,
    ) -> NotificationId {
        let limit = self.config.max_retained.max(1);
        while entries.len() >= limit {
            if let Some(evicted) = entries.pop_front() {
                evicted.cancel();
                debug!(notification_id = %evicted.notification.id, "Notification evicted");
            }
        }

        let id = NotificationId::new();
        entries.push_back(Entry {
            notification: Notification {
                id,
                message,
                severity,
                received_at: self.clock.now(),
            },
            dedup_key,
            expiry: self.schedule_expiry(id),
        });
        self.shared.publish(entries);
        id
    }

    fn schedule_expiry(&self, id: NotificationId) -> Option<AbortHandle> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(notification_id = %id, "No tokio runtime, notification will not expire");
            return None;
        };

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let ttl = self.config.ttl;
        let task = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(shared) = shared.upgrade() {
                shared.expire(id);
            }
        });
        Some(task.abort_handle())
    }
}

impl std::fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}
