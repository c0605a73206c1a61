// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Table driver: one link, many sessions, one shared context.

use crate::context::TableContext;
use crate::session::{ConnectionState, ServiceSession, StepCx};
use crate::sink::RenderSink;
use natar_app_core::control_port::ControlPort;
use natar_store_client::LinkControl;
use std::time::Instant;
use tracing::info;

/// Owns the store link and steps every session once per tick, in order.
#[derive(Debug)]
pub struct Table<L> {
    link: L,
    sessions: Vec<ServiceSession>,
    context: TableContext,
}

impl<L: LinkControl> Table<L> {
    /// Table over `link` with no sessions.
    pub fn new(link: L) -> Self {
        Self {
            link,
            sessions: Vec::new(),
            context: TableContext::new(),
        }
    }

    /// Register a session. It is fed the link's current state right away so
    /// it does not wait for the next edge.
    pub fn add_session(&mut self, mut session: ServiceSession) {
        session.attach(self.link.listen());
        self.link.notify_current_state();
        self.sessions.push(session);
    }

    /// Link maintenance, then one step per session.
    pub fn tick(&mut self, now: Instant, sink: &mut dyn RenderSink, control: &dyn ControlPort) {
        self.link.maintain(now);
        let mut cx = StepCx {
            source: &self.link,
            table: &mut self.context,
            sink,
            control,
            now,
        };
        for session in &mut self.sessions {
            session.step(&mut cx);
        }
    }

    /// Unsubscribe everything and release handles.
    pub fn shutdown(&mut self) {
        for session in &mut self.sessions {
            session.close();
        }
        info!(sessions = self.sessions.len(), "table shut down");
    }

    /// Sessions in tick order.
    pub fn sessions(&self) -> &[ServiceSession] {
        &self.sessions
    }

    /// Mutable access, e.g. to reconfigure one session.
    pub fn sessions_mut(&mut self) -> &mut [ServiceSession] {
        &mut self.sessions
    }

    /// First session named `name`.
    pub fn session(&self, name: &str) -> Option<&ServiceSession> {
        self.sessions.iter().find(|s| s.name() == name)
    }

    /// Number of sessions in `state`.
    pub fn count_in(&self, state: ConnectionState) -> usize {
        self.sessions.iter().filter(|s| s.state() == state).count()
    }

    /// Shared calibrations and poses.
    pub fn context(&self) -> &TableContext {
        &self.context
    }

    /// The store link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable store link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
