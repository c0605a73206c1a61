// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Strategy half of a session: what a feature loads, which channel it
//! follows, and what it does with each message.

use crate::context::TableContext;
use crate::sink::RenderSink;
use natar_store_client::{StoreError, StoreHandle};
use natar_store_proto::ChannelKey;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Why a load attempt did not reach `Working`.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Required keys are absent; the producer is probably not running yet.
    #[error("missing keys: {}", .0.join(", "))]
    Missing(Vec<String>),
    /// Another session has not produced something this one depends on.
    #[error("waiting for {0}")]
    Waiting(String),
    /// A key is present but its value is unusable.
    #[error("cannot decode {key}: {reason}")]
    Decode {
        /// Offending key.
        key: String,
        /// Decoder message.
        reason: String,
    },
    /// The session is wired wrong; retrying cannot help.
    #[error("misconfigured: {0}")]
    Configuration(String),
    /// Store round-trip failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoadError {
    /// Decode failure of `key`.
    pub fn decode(key: &ChannelKey, reason: impl Display) -> Self {
        Self::Decode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// What a feature may touch while it runs.
pub struct FeatureCx<'a> {
    /// Shared calibrations and poses.
    pub table: &'a mut TableContext,
    /// Rendering layer.
    pub sink: &'a mut dyn RenderSink,
}

/// Feature-specific load/decode strategy driven by a
/// [`ServiceSession`](crate::ServiceSession).
///
/// `on_message` runs on the tick thread with a payload already taken off the
/// subscription queue, so it may keep state freely but should not block.
pub trait Feature {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Key passed to the companion control endpoint when a load finds data
    /// missing.
    fn control_key(&self) -> &str;

    /// Fetch and decode everything the feature needs. Every required key is
    /// attempted before failing so the diagnostic is complete.
    fn try_load(
        &mut self,
        store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), LoadError>;

    /// Push feed to follow while working. `None` means the feature polls (or
    /// is done after loading).
    fn channel(&self) -> Option<ChannelKey> {
        None
    }

    /// Latest payload from the push feed.
    fn on_message(&mut self, _payload: Vec<u8>, _cx: &mut FeatureCx<'_>) {}

    /// Steady-state work, once per tick while working.
    fn update(
        &mut self,
        _store: &mut dyn StoreHandle,
        _cx: &mut FeatureCx<'_>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    /// Drop per-connection state after a transport loss.
    fn reset(&mut self) {}
}

/// Fetches keys for a load attempt and remembers which were absent.
///
/// ```
/// use natar_services::Fetch;
/// use natar_store_client::MemoryStore;
/// use natar_store_proto::ChannelKey;
///
/// let mut store = MemoryStore::new();
/// store.insert("cam:width", b"640");
/// let base = ChannelKey::new("cam");
/// let mut fetch = Fetch::new(&mut store);
/// let width = fetch.number::<usize>(&base.join("width")).unwrap();
/// let height = fetch.number::<usize>(&base.join("height")).unwrap();
/// assert_eq!((width, height), (Some(640), None));
/// assert_eq!(fetch.missing(), ["cam:height"]);
/// ```
pub struct Fetch<'s> {
    store: &'s mut dyn StoreHandle,
    missing: Vec<String>,
}

impl<'s> Fetch<'s> {
    /// Start a fetch pass.
    pub fn new(store: &'s mut dyn StoreHandle) -> Self {
        Self {
            store,
            missing: Vec::new(),
        }
    }

    /// Raw value of a required key.
    pub fn bytes(&mut self, key: &ChannelKey) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.store.get(key.as_str())?;
        if value.is_none() {
            self.missing.push(key.to_string());
        }
        Ok(value)
    }

    /// Trimmed text of a required key.
    pub fn text(&mut self, key: &ChannelKey) -> Result<Option<String>, StoreError> {
        Ok(self
            .bytes(key)?
            .map(|raw| String::from_utf8_lossy(&raw).trim().to_string()))
    }

    /// Text of a key that may legitimately be absent; never counted missing.
    pub fn optional_text(&mut self, key: &ChannelKey) -> Result<Option<String>, StoreError> {
        self.store.get_text(key.as_str())
    }

    /// Numeric value of a required key. A value that does not parse counts
    /// as missing.
    pub fn number<T: FromStr>(&mut self, key: &ChannelKey) -> Result<Option<T>, StoreError> {
        let Some(text) = self.text(key)? else {
            return Ok(None);
        };
        match text.parse() {
            Ok(n) => Ok(Some(n)),
            Err(_) => {
                debug!(key = %key, value = %text, "not a number");
                self.missing.push(key.to_string());
                Ok(None)
            }
        }
    }

    /// Keys found absent so far.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Finish a failed pass.
    pub fn into_missing(self) -> LoadError {
        LoadError::Missing(self.missing)
    }
}
