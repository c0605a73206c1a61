// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The shared store link: one probe socket, liveness checks, and
//! connectivity fan-out to listeners.
//!
//! The link never carries commands. It exists to answer "is the store
//! reachable" and to hand out [`StoreSession`]s, each with its own socket.
//! Connectivity edges are broadcast as [`LinkEvent`]s over channels so the
//! tick thread drains them at its own pace.

use crate::{LinkConfig, LinkControl, SessionSource, StoreError, StoreHandle, StoreSession};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Connectivity notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Connectivity flipped; raised exactly once per edge.
    Changed(bool),
    /// Current state, re-sent on request for listeners that registered late.
    Status(bool),
}

impl LinkEvent {
    /// Connectivity carried by the event.
    pub fn connected(self) -> bool {
        match self {
            Self::Changed(c) | Self::Status(c) => c,
        }
    }
}

/// Receiving half of a link listener registration.
#[derive(Debug)]
pub struct LinkEvents {
    rx: Receiver<LinkEvent>,
}

impl LinkEvents {
    /// Wrap a receiver (used by in-memory sources).
    pub fn from_receiver(rx: Receiver<LinkEvent>) -> Self {
        Self { rx }
    }

    /// Drain pending events in arrival order.
    pub fn drain(&self) -> Vec<LinkEvent> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(ev) => out.push(ev),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}

/// One physical connection to the store plus liveness bookkeeping.
#[derive(Debug)]
pub struct StoreLink {
    config: LinkConfig,
    stream: Option<TcpStream>,
    connected: bool,
    last_ping: Option<Instant>,
    last_attempt: Option<Instant>,
    listeners: Vec<Sender<LinkEvent>>,
}

impl StoreLink {
    /// Create a link in the disconnected state. Nothing is opened until
    /// [`connect`](Self::connect).
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            stream: None,
            connected: false,
            last_ping: None,
            last_attempt: None,
            listeners: Vec::new(),
        }
    }

    /// Configuration shared with spawned sessions.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Last connectivity state broadcast to listeners.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Open the transport. A call while the current socket is still alive is
    /// a no-op reporting success.
    pub fn connect(&mut self) -> Result<(), StoreError> {
        self.last_attempt = Some(Instant::now());
        if self.is_alive() {
            return Ok(());
        }
        self.stream = None;
        match self.config.open_stream() {
            Ok(stream) => {
                self.stream = Some(stream);
                info!(addr = %self.config.address(), "store link connected");
                self.set_connected(true);
                Ok(())
            }
            Err(err) => {
                debug!(addr = %self.config.address(), ?err, "store connect failed");
                self.set_connected(false);
                Err(err)
            }
        }
    }

    /// Non-blocking, non-destructive probe of the socket. Peeks instead of
    /// reading so buffered protocol bytes are never consumed.
    pub fn is_alive(&self) -> bool {
        let Some(stream) = &self.stream else {
            return false;
        };
        if stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut probe = [0u8; 1];
        let alive = match stream.peek(&mut probe) {
            Ok(0) => false,
            Ok(_) => true,
            Err(err) => err.kind() == ErrorKind::WouldBlock,
        };
        alive && stream.set_nonblocking(false).is_ok()
    }

    /// Liveness check. When a previously live socket is found dead the link
    /// drops it and raises `Changed(false)` once; recovery needs an explicit
    /// [`connect`](Self::connect).
    pub fn ping(&mut self) {
        self.last_ping = Some(Instant::now());
        if self.stream.is_some() && !self.is_alive() {
            self.stream = None;
            warn!(addr = %self.config.address(), "store link lost");
            self.set_connected(false);
        }
    }

    /// Run whichever maintenance is due at `now`: a reconnect attempt while
    /// down, a liveness probe while up.
    pub fn poll(&mut self, now: Instant) {
        if self.connected {
            let due = self
                .last_ping
                .is_none_or(|t| now.saturating_duration_since(t) >= self.config.ping_interval);
            if due {
                self.ping();
            }
        } else if self.reconnect_due(now) {
            let _ = self.connect();
        }
    }

    /// True when the link is down and the reconnect spacing has elapsed.
    pub fn reconnect_due(&self, now: Instant) -> bool {
        !self.connected
            && self
                .last_attempt
                .is_none_or(|t| now.saturating_duration_since(t) >= self.config.reconnect_interval)
    }

    /// Register a listener. Late listeners should call
    /// [`notify_current_state`](Self::notify_current_state) afterwards.
    pub fn listen(&mut self) -> LinkEvents {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        LinkEvents { rx }
    }

    /// Send the current state to every listener as a `Status` event.
    pub fn notify_current_state(&mut self) {
        let connected = self.connected;
        self.broadcast(LinkEvent::Status(connected));
    }

    /// Open a new command session on its own socket. Fails fast when the
    /// link itself is not alive.
    pub fn create_session(&self) -> Result<StoreSession, StoreError> {
        if !self.is_alive() {
            return Err(StoreError::LinkDown);
        }
        StoreSession::connect(self.config.clone())
    }

    /// Drop the socket and tell listeners.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            info!(addr = %self.config.address(), "store link closed");
        }
        self.set_connected(false);
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            self.connected = connected;
            self.broadcast(LinkEvent::Changed(connected));
        }
    }

    fn broadcast(&mut self, event: LinkEvent) {
        self.listeners.retain(|tx| tx.send(event).is_ok());
    }
}

impl SessionSource for StoreLink {
    fn is_link_alive(&self) -> bool {
        self.is_alive()
    }

    fn open_session(&self) -> Result<Box<dyn StoreHandle>, StoreError> {
        Ok(Box::new(self.create_session()?))
    }
}

impl LinkControl for StoreLink {
    fn maintain(&mut self, now: Instant) {
        self.poll(now);
    }

    fn listen(&mut self) -> LinkEvents {
        StoreLink::listen(self)
    }

    fn notify_current_state(&mut self) {
        StoreLink::notify_current_state(self);
    }
}
