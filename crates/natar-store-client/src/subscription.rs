// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Consumer side of a push feed.
//!
//! The transport's listener pushes into a bounded queue; the tick thread
//! drains it. Messages are moved across whole, so the consumer never sees a
//! buffer mid-write.

use crate::StoreError;
use natar_store_proto::{ChannelKey, PushMessage};
use std::fmt;
use std::sync::mpsc::{Receiver, TryRecvError};

type Cancel = Box<dyn FnOnce() + Send>;

/// Active subscription. Dropping it unsubscribes.
pub struct Subscription {
    channel: ChannelKey,
    rx: Receiver<PushMessage>,
    cancel: Option<Cancel>,
    closed: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Assemble a subscription from its queue and a cancel hook that tells
    /// the server to stop delivering.
    pub fn new(
        channel: ChannelKey,
        rx: Receiver<PushMessage>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            channel,
            rx,
            cancel: Some(Box::new(cancel)),
            closed: false,
        }
    }

    /// Channel this feed is bound to.
    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    /// Take up to `max` queued payloads, oldest first. Returns
    /// [`StoreError::Closed`] once the producer side is gone and the queue is
    /// empty.
    pub fn drain(&mut self, max: usize) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.rx.try_recv() {
                Ok(msg) => out.push(msg.payload),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        if out.is_empty() && self.closed {
            return Err(StoreError::Closed);
        }
        Ok(out)
    }

    /// Newest queued payload, discarding older ones.
    pub fn latest(&mut self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.drain(usize::MAX)?.pop())
    }

    /// Unsubscribe now. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
