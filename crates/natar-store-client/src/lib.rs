// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Blocking client for the table store.
//!
//! - [`StoreLink`]: the shared link; probes liveness and broadcasts
//!   connectivity edges.
//! - [`StoreSession`]: a command handle on its own socket (`GET`/`SET`/...).
//! - [`Subscription`]: a push feed drained from the tick thread.
//! - [`MemoryStore`]: an in-process store for tests and offline runs.
//!
//! Feature code talks to the [`SessionSource`] and [`StoreHandle`] ports so
//! the same state machine runs against TCP or memory.

mod config;
mod error;
mod link;
mod memory;
mod session;
mod subscription;

pub use config::LinkConfig;
pub use error::StoreError;
pub use link::{LinkEvent, LinkEvents, StoreLink};
pub use memory::MemoryStore;
pub use session::{ReplyReader, StoreSession};
pub use subscription::Subscription;

use natar_store_proto::ChannelKey;
use std::time::Instant;

/// Command surface shared by TCP sessions and the in-memory store.
pub trait StoreHandle: Send {
    /// Fetch a value; `None` when the key is absent.
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Store a value.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    /// Publish to a channel; returns the receiver count.
    fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<i64, StoreError>;
    /// Start a push feed for `channel`.
    fn subscribe(&mut self, channel: &ChannelKey) -> Result<Subscription, StoreError>;

    /// Fetch a value as trimmed UTF-8 text (lossy).
    fn get_text(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .get(key)?
            .map(|raw| String::from_utf8_lossy(&raw).trim().to_string()))
    }
}

/// Something that can report link health and open command handles.
pub trait SessionSource {
    /// Non-blocking liveness check of the shared link.
    fn is_link_alive(&self) -> bool;
    /// Open a new handle; fails fast when the link is down.
    fn open_session(&self) -> Result<Box<dyn StoreHandle>, StoreError>;
}

/// Link-level upkeep driven from the tick loop.
pub trait LinkControl: SessionSource {
    /// Probe or reconnect, whichever is due at `now`.
    fn maintain(&mut self, now: Instant);
    /// Register a connectivity listener.
    fn listen(&mut self) -> LinkEvents;
    /// Re-send the current state to every listener.
    fn notify_current_state(&mut self);
}
