//! In-process transport used by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use notecast_events::ChannelKind;

use crate::{ChannelHandle, RawHandler, Transport, TransportError};

type Handlers = Arc<Mutex<HashMap<(String, String), Vec<RawHandler>>>>;

/// Minimal transport that records calls and delivers on demand.
#[derive(Default)]
pub(crate) struct FakeTransport {
    handlers: Handlers,
    log: Mutex<Vec<String>>,
    pub(crate) refuse: Mutex<Option<String>>,
}

struct FakeChannel {
    name: String,
    handlers: Handlers,
}

impl ChannelHandle for FakeChannel {
    fn on(&self, event_name: &str, handler: RawHandler) {
        self.handlers
            .lock()
            .unwrap()
            .entry((self.name.clone(), event_name.to_string()))
            .or_default()
            .push(handler);
    }
}

impl Transport for FakeTransport {
    fn subscribe(
        &self,
        _kind: ChannelKind,
        name: &str,
    ) -> Result<Box<dyn ChannelHandle>, TransportError> {
        if self.refuse.lock().unwrap().as_deref() == Some(name) {
            return Err(TransportError::Refused(name.to_string()));
        }
        self.log.lock().unwrap().push(format!("+{name}"));
        Ok(Box::new(FakeChannel {
            name: name.to_string(),
            handlers: self.handlers.clone(),
        }))
    }

    fn unsubscribe(&self, name: &str) {
        self.log.lock().unwrap().push(format!("-{name}"));
    }
}

impl FakeTransport {
    pub(crate) fn deliver(&self, channel: &str, event_name: &str, payload: serde_json::Value) {
        let handlers = self
            .handlers
            .lock()
            .unwrap()
            .get(&(channel.to_string(), event_name.to_string()))
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(&payload);
        }
    }

    pub(crate) fn registrations(&self, channel: &str, event_name: &str) -> usize {
        self.handlers
            .lock()
            .unwrap()
            .get(&(channel.to_string(), event_name.to_string()))
            .map_or(0, Vec::len)
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

