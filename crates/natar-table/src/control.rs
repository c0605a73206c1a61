// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Companion control over HTTP: `GET <base>/<ns>/<key>/<action>`, never
//! awaited by the caller.

use natar_app_core::control_port::{ControlAction, ControlPort};
use natar_app_core::prefs::ControlPrefs;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, trace};

/// Fire-and-forget control requests spawned onto the runtime.
pub struct HttpControl {
    prefs: ControlPrefs,
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpControl {
    /// Build a client for `prefs`, spawning requests on `runtime`.
    pub fn new(prefs: ControlPrefs, runtime: Handle) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            prefs,
            client,
            runtime,
        })
    }
}

impl ControlPort for HttpControl {
    fn request(&self, key: &str, action: ControlAction) {
        let url = self.prefs.url(key, action);
        let client = self.client.clone();
        trace!(%url, "control request");
        self.runtime.spawn(async move {
            match client.get(&url).send().await {
                Ok(resp) => debug!(%url, status = %resp.status(), "control answered"),
                Err(err) => debug!(%url, %err, "control unreachable"),
            }
        });
    }
}
