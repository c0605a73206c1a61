// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Channel keys: one string names both a store entry and the pub/sub topic
//! that carries its updates (`"<object>:<feature>"`).

use std::fmt;

/// Well-known key suffixes published by the sensor producers.
pub mod suffix {
    /// Image width in pixels (decimal text).
    pub const WIDTH: &str = "width";
    /// Image height in pixels (decimal text).
    pub const HEIGHT: &str = "height";
    /// Bytes per pixel of the raw frame (3 = RGB, 2 = 16-bit depth).
    pub const CHANNELS: &str = "channels";
    /// Free-form pixel format tag (e.g. `RGB`, `GRAY16`).
    pub const PIXEL_FORMAT: &str = "pixelformat";
    /// Intrinsics record (JSON).
    pub const CALIBRATION: &str = "calibration";
    /// Extrinsics record (JSON, 16 floats row-major).
    pub const EXTRINSICS: &str = "extrinsics";
    /// Tracked pose record.
    pub const POSE: &str = "pose";
    /// Detected marker set (JSON).
    pub const DETECTED_MARKERS: &str = "detected-markers";
    /// Point offset (JSON `{x, y, z}`).
    pub const POSITION: &str = "position";
}

/// Store key / pub-sub topic name.
///
/// Stable for the lifetime of a session; a session whose key changes must
/// drop its subscription and subscribe again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Wrap a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for `feature` of a scene object. Object names are lower-cased the
    /// way producers publish them.
    pub fn for_object(object: &str, feature: &str) -> Self {
        Self(format!("{}:{}", object.to_lowercase(), feature))
    }

    /// Child key `self:suffix`.
    pub fn join(&self, suffix: &str) -> Self {
        Self(format!("{}:{}", self.0, suffix))
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes, as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// True for the empty key (never valid on the wire).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ChannelKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}
