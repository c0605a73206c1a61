// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-process store with the same key/value and pub/sub surface as the TCP
//! client.
//!
//! Clones share state, so a test can hold one handle to seed keys and flip
//! connectivity while the code under test holds another.

use crate::{
    LinkControl, LinkEvent, LinkEvents, SessionSource, StoreError, StoreHandle, Subscription,
};
use natar_store_proto::{ChannelKey, PushMessage};
use std::collections::HashMap;
use std::sync::mpsc::{self, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

const QUEUE_DEPTH: usize = 16;

/// Shared in-memory store.
///
/// # Example
///
/// ```
/// use natar_store_client::{MemoryStore, SessionSource, StoreHandle};
///
/// let store = MemoryStore::new();
/// store.insert("camera0:width", b"640");
/// let mut handle = store.open_session().unwrap();
/// assert_eq!(handle.get_text("camera0:width").unwrap().as_deref(), Some("640"));
/// assert_eq!(store.get_count(), 1);
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

struct MemoryStoreInner {
    values: HashMap<String, Vec<u8>>,
    subscribers: Vec<Subscriber>,
    listeners: Vec<Sender<LinkEvent>>,
    next_id: u64,
    online: bool,
    get_count: usize,
    sessions_opened: usize,
}

struct Subscriber {
    id: u64,
    channel: String,
    tx: SyncSender<PushMessage>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty, online store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                values: HashMap::new(),
                subscribers: Vec::new(),
                listeners: Vec::new(),
                next_id: 0,
                online: true,
                get_count: 0,
                sessions_opened: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a key.
    pub fn insert(&self, key: &str, value: &[u8]) {
        self.lock().values.insert(key.to_string(), value.to_vec());
    }

    /// Remove a key.
    pub fn remove(&self, key: &str) {
        self.lock().values.remove(key);
    }

    /// Read a key without touching the counters.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().values.get(key).cloned()
    }

    /// Deliver `payload` to every subscriber of `channel`; returns how many
    /// queues accepted it.
    pub fn publish(&self, channel: &str, payload: &[u8]) -> usize {
        let mut inner = self.lock();
        let mut delivered = 0;
        inner.subscribers.retain(|sub| {
            if sub.channel != channel {
                return true;
            }
            let msg = PushMessage {
                channel: channel.to_string(),
                payload: payload.to_vec(),
            };
            match sub.tx.try_send(msg) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
        delivered
    }

    /// Simulate the server going away or coming back. Going offline closes
    /// every feed; listeners hear about each edge once.
    pub fn set_online(&self, online: bool) {
        let mut inner = self.lock();
        if !online {
            inner.subscribers.clear();
        }
        if inner.online != online {
            inner.online = online;
            inner
                .listeners
                .retain(|tx| tx.send(LinkEvent::Changed(online)).is_ok());
        }
    }

    /// Active subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| s.channel == channel)
            .count()
    }

    /// Number of `GET` calls served (hits and misses).
    pub fn get_count(&self) -> usize {
        self.lock().get_count
    }

    /// Number of handles opened.
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }
}

impl SessionSource for MemoryStore {
    fn is_link_alive(&self) -> bool {
        self.lock().online
    }

    fn open_session(&self) -> Result<Box<dyn StoreHandle>, StoreError> {
        let mut inner = self.lock();
        if !inner.online {
            return Err(StoreError::LinkDown);
        }
        inner.sessions_opened += 1;
        Ok(Box::new(self.clone()))
    }
}

impl LinkControl for MemoryStore {
    fn maintain(&mut self, _now: Instant) {}

    fn listen(&mut self) -> LinkEvents {
        let (tx, rx) = mpsc::channel();
        self.lock().listeners.push(tx);
        LinkEvents::from_receiver(rx)
    }

    fn notify_current_state(&mut self) {
        let mut inner = self.lock();
        let online = inner.online;
        inner
            .listeners
            .retain(|tx| tx.send(LinkEvent::Status(online)).is_ok());
    }
}

impl StoreHandle for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.lock();
        if !inner.online {
            return Err(StoreError::Closed);
        }
        inner.get_count += 1;
        Ok(inner.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.online {
            return Err(StoreError::Closed);
        }
        inner.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<i64, StoreError> {
        if !self.is_link_alive() {
            return Err(StoreError::Closed);
        }
        Ok(MemoryStore::publish(self, channel, payload) as i64)
    }

    fn subscribe(&mut self, channel: &ChannelKey) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::sync_channel(QUEUE_DEPTH);
        let id = {
            let mut inner = self.lock();
            if !inner.online {
                return Err(StoreError::Closed);
            }
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push(Subscriber {
                id,
                channel: channel.to_string(),
                tx,
            });
            id
        };
        let store = self.clone();
        Ok(Subscription::new(channel.clone(), rx, move || {
            store.lock().subscribers.retain(|s| s.id != id);
        }))
    }
}
