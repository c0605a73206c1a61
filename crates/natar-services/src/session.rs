// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The per-feature retry state machine.
//!
//! ```text
//! DISCONNECTED --link up-------> CONNECTED --load ok--> WORKING
//!      ^                          |    ^                   |
//!      |                          +----+ load failed        |
//!      +------------------- link down / transport lost -----+
//! ```
//!
//! A session is stepped once per tick. Outside `Working` it performs at most
//! one transition attempt and returns; in `Working` it hands the newest push
//! payload to its feature and runs the feature's steady-state update.

use crate::context::TableContext;
use crate::feature::{Feature, FeatureCx, LoadError};
use crate::sink::RenderSink;
use natar_app_core::control_port::{ControlAction, ControlPort};
use natar_store_client::{LinkEvents, SessionSource, StoreError, StoreHandle, Subscription};
use natar_store_proto::ChannelKey;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport up, feature data not loaded yet.
    Connected,
    /// Transport up and feature data loaded.
    Working,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Working => "working",
        })
    }
}

/// Caller errors on the subscription surface.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A feed is already active; unsubscribe first.
    #[error("already subscribed to {0}")]
    AlreadySubscribed(ChannelKey),
    /// No store handle is open.
    #[error("session is not connected")]
    NotConnected,
    /// The store refused or the transport failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Collaborators lent to a session for one step.
pub struct StepCx<'a> {
    /// Link health and handle factory.
    pub source: &'a dyn SessionSource,
    /// Shared calibrations and poses.
    pub table: &'a mut TableContext,
    /// Rendering layer.
    pub sink: &'a mut dyn RenderSink,
    /// Companion control side channel.
    pub control: &'a dyn ControlPort,
    /// Tick timestamp.
    pub now: Instant,
}

/// One feature's connect/load/subscribe lifecycle.
pub struct ServiceSession {
    feature: Box<dyn Feature>,
    state: ConnectionState,
    events: Option<LinkEvents>,
    // Declared before `handle`: the feed is cancelled before its handle drops.
    subscription: Option<Subscription>,
    handle: Option<Box<dyn StoreHandle>>,
    misconfigured: bool,
    retry_interval: Duration,
    last_load: Option<Instant>,
    failed_loads: u32,
}

impl fmt::Debug for ServiceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSession")
            .field("feature", &self.feature.name())
            .field("state", &self.state)
            .field("subscription", &self.subscription)
            .field("misconfigured", &self.misconfigured)
            .field("failed_loads", &self.failed_loads)
            .finish_non_exhaustive()
    }
}

impl ServiceSession {
    /// Wrap a feature. The session starts disconnected and loads on every
    /// tick while connected.
    pub fn new(feature: Box<dyn Feature>) -> Self {
        Self {
            feature,
            state: ConnectionState::Disconnected,
            events: None,
            subscription: None,
            handle: None,
            misconfigured: false,
            retry_interval: Duration::ZERO,
            last_load: None,
            failed_loads: 0,
        }
    }

    /// Space load attempts at least `interval` apart.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Feature name.
    pub fn name(&self) -> &str {
        self.feature.name()
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True after a configuration error, until [`reconfigure`](Self::reconfigure).
    pub fn is_misconfigured(&self) -> bool {
        self.misconfigured
    }

    /// Failed load attempts since the last success.
    pub fn failed_loads(&self) -> u32 {
        self.failed_loads
    }

    /// Channel of the active push feed.
    pub fn subscribed_channel(&self) -> Option<&ChannelKey> {
        self.subscription.as_ref().map(Subscription::channel)
    }

    /// Receive connectivity events from a link.
    pub fn attach(&mut self, events: LinkEvents) {
        self.events = Some(events);
    }

    /// Drive the `Disconnected`/`Connected` edges. Repeated reports of the
    /// same connectivity are ignored.
    pub fn on_connectivity_changed(&mut self, connected: bool) {
        match (connected, self.state) {
            (true, ConnectionState::Disconnected) => {
                self.last_load = None;
                self.transition(ConnectionState::Connected);
            }
            (false, ConnectionState::Connected | ConnectionState::Working) => {
                self.teardown();
                self.transition(ConnectionState::Disconnected);
            }
            _ => {}
        }
    }

    /// Start over from `Disconnected`.
    pub fn request_reconnect(&mut self) {
        self.teardown();
        self.transition(ConnectionState::Disconnected);
    }

    /// Swap in a corrected feature and start over. Clears a configuration
    /// error.
    pub fn reconfigure(&mut self, feature: Box<dyn Feature>) {
        self.teardown();
        self.feature = feature;
        self.misconfigured = false;
        self.failed_loads = 0;
        self.transition(ConnectionState::Disconnected);
    }

    /// One load cycle. Opens a handle if needed, runs the feature's load, and
    /// subscribes its channel. Returns whether the session reached `Working`.
    ///
    /// Missing data issues exactly one control `start` request per call.
    pub fn try_load(&mut self, cx: &mut StepCx<'_>) -> bool {
        if self.misconfigured {
            return false;
        }
        self.last_load = Some(cx.now);
        if self.handle.is_none() {
            match cx.source.open_session() {
                Ok(handle) => self.handle = Some(handle),
                Err(err) => {
                    debug!(session = %self.feature.name(), ?err, "no store handle");
                    self.lose_transport();
                    return false;
                }
            }
        }
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        let mut fcx = FeatureCx {
            table: &mut *cx.table,
            sink: &mut *cx.sink,
        };
        let result = self.feature.try_load(&mut **handle, &mut fcx);
        match result {
            Ok(()) => self.finish_load(),
            Err(err) => {
                self.load_failed(err, cx.control);
                false
            }
        }
    }

    fn finish_load(&mut self) -> bool {
        if let Some(channel) = self.feature.channel() {
            if let Err(err) = self.subscribe(&channel) {
                warn!(session = %self.feature.name(), %channel, %err, "subscribe failed");
                if matches!(&err, SessionError::Store(e) if e.is_transport()) {
                    self.lose_transport();
                }
                return false;
            }
        }
        self.failed_loads = 0;
        self.transition(ConnectionState::Working);
        true
    }

    fn load_failed(&mut self, err: LoadError, control: &dyn ControlPort) {
        let name = self.feature.name();
        match err {
            LoadError::Missing(keys) => {
                self.failed_loads += 1;
                let missing = keys.join(", ");
                if self.failed_loads == 1 {
                    warn!(session = %name, %missing, "data not available yet");
                } else {
                    debug!(session = %name, %missing, attempt = self.failed_loads, "still missing");
                }
                control.request(self.feature.control_key(), ControlAction::Start);
            }
            LoadError::Waiting(what) => {
                debug!(session = %name, %what, "waiting");
            }
            LoadError::Decode { key, reason } => {
                self.failed_loads += 1;
                if self.failed_loads == 1 {
                    warn!(session = %name, %key, %reason, "unusable value");
                } else {
                    debug!(session = %name, %key, %reason, "unusable value");
                }
            }
            LoadError::Configuration(reason) => {
                error!(session = %name, %reason, "session misconfigured; not retrying");
                self.misconfigured = true;
            }
            LoadError::Store(err) if err.is_transport() => {
                debug!(session = %name, ?err, "transport lost during load");
                self.lose_transport();
            }
            LoadError::Store(err) => {
                debug!(session = %name, %err, "store refused load");
            }
        }
    }

    /// Start a push feed. A session holds at most one; changing channel means
    /// [`unsubscribe`](Self::unsubscribe) first.
    pub fn subscribe(&mut self, channel: &ChannelKey) -> Result<(), SessionError> {
        if let Some(active) = &self.subscription {
            return Err(SessionError::AlreadySubscribed(active.channel().clone()));
        }
        let handle = self.handle.as_mut().ok_or(SessionError::NotConnected)?;
        let subscription = handle.subscribe(channel)?;
        debug!(session = %self.feature.name(), %channel, "subscribed");
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Cancel the feed on `channel`. Returns whether one was active.
    pub fn unsubscribe(&mut self, channel: &ChannelKey) -> bool {
        if self.subscribed_channel() != Some(channel) {
            return false;
        }
        self.drop_subscription();
        true
    }

    /// Advance by one tick.
    pub fn step(&mut self, cx: &mut StepCx<'_>) {
        if self.drain_events() {
            return;
        }
        match self.state {
            ConnectionState::Disconnected => {
                if cx.source.is_link_alive() {
                    self.on_connectivity_changed(true);
                }
            }
            ConnectionState::Connected => {
                if self.load_due(cx.now) {
                    self.try_load(cx);
                }
            }
            ConnectionState::Working => self.work(cx),
        }
    }

    /// Tear down and stay disconnected (object destroyed, app quitting).
    pub fn close(&mut self) {
        self.teardown();
        self.transition(ConnectionState::Disconnected);
    }

    fn work(&mut self, cx: &mut StepCx<'_>) {
        let wanted = self.feature.channel();
        if self.subscribed_channel() != wanted.as_ref() {
            self.drop_subscription();
            if let Some(channel) = wanted {
                if let Err(err) = self.subscribe(&channel) {
                    warn!(session = %self.feature.name(), %channel, %err, "resubscribe failed");
                    self.lose_transport();
                    return;
                }
            }
        }

        let mut fcx = FeatureCx {
            table: &mut *cx.table,
            sink: &mut *cx.sink,
        };
        if let Some(subscription) = self.subscription.as_mut() {
            match subscription.latest() {
                Ok(Some(payload)) => self.feature.on_message(payload, &mut fcx),
                Ok(None) => {}
                Err(err) => {
                    warn!(session = %self.feature.name(), %err, "push feed closed");
                    self.lose_transport();
                    return;
                }
            }
        }
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        if let Err(err) = self.feature.update(&mut **handle, &mut fcx) {
            if err.is_transport() {
                warn!(session = %self.feature.name(), %err, "transport lost");
                self.lose_transport();
            } else {
                debug!(session = %self.feature.name(), %err, "update failed");
            }
        }
    }

    fn drain_events(&mut self) -> bool {
        let events = self
            .events
            .as_ref()
            .map(LinkEvents::drain)
            .unwrap_or_default();
        let before = self.state;
        for event in events {
            self.on_connectivity_changed(event.connected());
        }
        self.state != before
    }

    fn load_due(&self, now: Instant) -> bool {
        self.last_load
            .is_none_or(|t| now.saturating_duration_since(t) >= self.retry_interval)
    }

    fn lose_transport(&mut self) {
        self.teardown();
        self.transition(ConnectionState::Disconnected);
    }

    fn drop_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
            debug!(session = %self.feature.name(), channel = %subscription.channel(), "unsubscribed");
        }
    }

    fn teardown(&mut self) {
        self.drop_subscription();
        self.handle = None;
        self.feature.reset();
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            info!(session = %self.feature.name(), from = %self.state, to = %next, "state");
            self.state = next;
        }
    }
}
