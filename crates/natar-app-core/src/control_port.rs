// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port for nudging the companion process that produces store data.
//!
//! Requests are fire-and-forget: implementations must not block the caller
//! or report failures back to it.

use crate::prefs::ControlPrefs;
use std::fmt;

/// Action requested for a producer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Start publishing the key.
    Start,
    /// Stop publishing the key.
    Stop,
    /// Restart the producer.
    Restart,
    /// Ask the producer to self-test.
    Test,
}

impl ControlAction {
    /// Path segment for the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort control side channel.
pub trait ControlPort {
    /// Request `action` for the producer behind `key`.
    fn request(&self, key: &str, action: ControlAction);
}

/// Control port that does nothing (control disabled).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoControl;

impl ControlPort for NoControl {
    fn request(&self, _key: &str, _action: ControlAction) {}
}

impl ControlPrefs {
    /// `<base>/<namespace>/<key>/<action>`.
    pub fn url(&self, key: &str, action: ControlAction) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.namespace.trim_matches('/'),
            key,
            action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_layout() {
        let prefs = ControlPrefs::default();
        assert_eq!(
            prefs.url("camera0", ControlAction::Start),
            "http://localhost:8124/nectar/camera0/start"
        );
        let slashed = ControlPrefs {
            base_url: "http://host:1/".into(),
            namespace: "/ns/".into(),
            enabled: true,
        };
        assert_eq!(
            slashed.url("table", ControlAction::Restart),
            "http://host:1/ns/table/restart"
        );
    }
}
