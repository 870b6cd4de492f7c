//! # notecast-testing
//!
//! An in-memory fan-out hub that plays both ends of the transport: it is a
//! [`Broadcaster`] for publishers and hands out connections implementing the
//! receiver [`Transport`] trait. Subscribe and unsubscribe calls are counted
//! per channel so tests can assert on what reached the transport.
//!
//! ```ignore
//! let hub = InMemoryHub::new();
//! let publisher = Publisher::new(Arc::new(hub.clone()));
//! let conn = hub.connect();
//! let mut session = NotificationSession::new(config, TransportReady::ready(conn));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use notecast_broadcast::{BroadcastError, Broadcaster};
use notecast_events::{ChannelKind, ChannelSelector, WireMessage};
use notecast_id::SocketId;
use notecast_receiver::{ChannelHandle, RawHandler, Transport, TransportError};
use tracing::debug;

type HandlerMap = Arc<Mutex<HashMap<String, Vec<RawHandler>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A message accepted by the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub channels: Vec<String>,
    pub message: WireMessage,
    pub except: Option<SocketId>,
}

struct Member {
    connection: u64,
    handlers: HandlerMap,
}

#[derive(Default)]
struct HubState {
    next_connection: u64,
    sockets: HashMap<SocketId, u64>,
    members: BTreeMap<String, Vec<Member>>,
    subscribes: HashMap<String, usize>,
    unsubscribes: HashMap<String, usize>,
    published: Vec<PublishedMessage>,
}

struct HubInner {
    state: Mutex<HubState>,
    available: AtomicBool,
}

/// In-process fan-out hub.
#[derive(Clone)]
pub struct InMemoryHub {
    inner: Arc<HubInner>,
}

impl Default for InMemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState::default()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Opens a new client connection with its own socket id.
    pub fn connect(&self) -> Arc<HubConnection> {
        let mut state = lock(&self.inner.state);
        state.next_connection += 1;
        let id = state.next_connection;
        let socket_id = SocketId::from_parts(id, id * 1000 + 1);
        state.sockets.insert(socket_id.clone(), id);
        Arc::new(HubConnection {
            hub: self.clone(),
            id,
            socket_id,
        })
    }

    /// While unavailable, broadcasts fail with [`BroadcastError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Every message accepted so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.inner.state).published.clone()
    }

    /// Transport-level subscribe calls seen for `channel`.
    pub fn subscribe_count(&self, channel: &str) -> usize {
        lock(&self.inner.state)
            .subscribes
            .get(channel)
            .copied()
            .unwrap_or(0)
    }

    /// Transport-level unsubscribe calls seen for `channel`.
    pub fn unsubscribe_count(&self, channel: &str) -> usize {
        lock(&self.inner.state)
            .unsubscribes
            .get(channel)
            .copied()
            .unwrap_or(0)
    }

    /// Connections currently subscribed to `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        lock(&self.inner.state)
            .members
            .get(channel)
            .map_or(0, Vec::len)
    }

    /// Delivers a message to one channel as if the server sent it, bypassing
    /// the publisher. Useful for redeliveries and foreign event names.
    pub fn inject(&self, channel: &str, message: &WireMessage) -> usize {
        self.deliver(&[channel.to_string()], message, None)
    }

    /// Invokes matching handlers with the hub lock released, so handlers may
    /// subscribe or unsubscribe.
    fn deliver(&self, channels: &[String], message: &WireMessage, except: Option<u64>) -> usize {
        let targets: Vec<RawHandler> = {
            let state = lock(&self.inner.state);
            channels
                .iter()
                .filter_map(|channel| state.members.get(channel))
                .flatten()
                .filter(|member| Some(member.connection) != except)
                .flat_map(|member| {
                    lock(&member.handlers)
                        .get(&message.event_name)
                        .cloned()
                        .unwrap_or_default()
                })
                .collect()
        };

        for handler in &targets {
            handler(&message.payload);
        }
        targets.len()
    }

    fn connection_for(&self, socket_id: &SocketId) -> Option<u64> {
        lock(&self.inner.state).sockets.get(socket_id).copied()
    }
}

#[async_trait]
impl Broadcaster for InMemoryHub {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn broadcast(
        &self,
        channels: &[ChannelSelector],
        message: &WireMessage,
        except: Option<&SocketId>,
    ) -> Result<(), BroadcastError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(BroadcastError::Unavailable("hub offline".to_string()));
        }

        let names: Vec<String> = channels.iter().map(ChannelSelector::name).collect();
        lock(&self.inner.state).published.push(PublishedMessage {
            channels: names.clone(),
            message: message.clone(),
            except: except.cloned(),
        });

        let skip = except.and_then(|socket_id| self.connection_for(socket_id));
        let delivered = self.deliver(&names, message, skip);
        debug!(event_name = %message.event_name, delivered, "Hub delivered message");
        Ok(())
    }
}

/// One client connection to the hub.
pub struct HubConnection {
    hub: InMemoryHub,
    id: u64,
    socket_id: SocketId,
}

impl HubConnection {
    /// Socket id to pass along with actions so the hub can skip this
    /// connection.
    pub fn socket_id(&self) -> &SocketId {
        &self.socket_id
    }
}

struct HubChannel {
    handlers: HandlerMap,
}

impl ChannelHandle for HubChannel {
    fn on(&self, event_name: &str, handler: RawHandler) {
        lock(&self.handlers)
            .entry(event_name.to_string())
            .or_default()
            .push(handler);
    }
}

impl Transport for HubConnection {
    fn subscribe(
        &self,
        kind: ChannelKind,
        name: &str,
    ) -> Result<Box<dyn ChannelHandle>, TransportError> {
        let mut state = lock(&self.hub.inner.state);
        *state.subscribes.entry(name.to_string()).or_default() += 1;

        let members = state.members.entry(name.to_string()).or_default();
        let handlers = match members.iter().find(|m| m.connection == self.id) {
            Some(member) => member.handlers.clone(),
            None => {
                let handlers = HandlerMap::default();
                members.push(Member {
                    connection: self.id,
                    handlers: handlers.clone(),
                });
                handlers
            }
        };

        debug!(connection = self.id, channel = name, kind = %kind, "Hub subscribe");
        Ok(Box::new(HubChannel { handlers }))
    }

    fn unsubscribe(&self, name: &str) {
        let mut state = lock(&self.hub.inner.state);
        *state.unsubscribes.entry(name.to_string()).or_default() += 1;

        if let Some(members) = state.members.get_mut(name) {
            members.retain(|m| m.connection != self.id);
            if members.is_empty() {
                state.members.remove(name);
            }
        }
        debug!(connection = self.id, channel = name, "Hub unsubscribe");
    }
}
