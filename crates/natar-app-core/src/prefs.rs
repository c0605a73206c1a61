// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved table preferences: store link, companion control, tick rate, and the
//! services to run.

use serde::{Deserialize, Serialize};

/// Config key the table runtime saves its preferences under.
pub const PREFS_KEY: &str = "table";

/// Saved preferences for one table runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablePrefs {
    /// Store connection.
    pub store: StorePrefs,
    /// Companion control endpoint.
    pub control: ControlPrefs,
    /// Driving tick rate.
    pub tick_hz: u32,
    /// Minimum spacing between load attempts of one session, in ms
    /// (0 = every tick).
    pub load_retry_ms: u64,
    /// Services to run, in tick order.
    pub services: Vec<ServiceSpec>,
}

impl Default for TablePrefs {
    fn default() -> Self {
        Self {
            store: StorePrefs::default(),
            control: ControlPrefs::default(),
            tick_hz: 30,
            load_retry_ms: 0,
            services: vec![
                ServiceSpec::Camera {
                    camera: "camera0".into(),
                    role: CameraRole::Rgb,
                    near: 0.3,
                    far: 1000.0,
                },
                ServiceSpec::Video {
                    key: "camera0".into(),
                    feed: VideoFeed::Stream,
                    markers: true,
                },
            ],
        }
    }
}

/// Store link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorePrefs {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Disable Nagle.
    pub nodelay: bool,
    /// Socket timeout (ms).
    pub io_timeout_ms: u64,
    /// Liveness probe interval (ms).
    pub ping_interval_ms: u64,
    /// Reconnect spacing while down (ms).
    pub reconnect_interval_ms: u64,
    /// Per-subscription queue bound.
    pub queue_depth: usize,
}

impl Default for StorePrefs {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            nodelay: true,
            io_timeout_ms: 500,
            ping_interval_ms: 2000,
            reconnect_interval_ms: 1000,
            queue_depth: 4,
        }
    }
}

/// Companion process control endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPrefs {
    /// Send control requests at all.
    pub enabled: bool,
    /// Base URL, e.g. `http://localhost:8124`.
    pub base_url: String,
    /// Path namespace after the base URL.
    pub namespace: String,
}

impl Default for ControlPrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:8124".into(),
            namespace: "nectar".into(),
        }
    }
}

/// Which sensor a camera service calibrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraRole {
    /// Color camera: intrinsics only.
    #[default]
    Rgb,
    /// Depth camera: intrinsics and extrinsics.
    Depth,
    /// Projector: intrinsics and extrinsics.
    Projector,
}

impl CameraRole {
    /// Whether this role also loads a pose.
    pub fn needs_extrinsics(self) -> bool {
        !matches!(self, Self::Rgb)
    }
}

/// How a video service receives frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFeed {
    /// Push payload is the frame.
    #[default]
    Stream,
    /// Push marks the frame dirty; the next tick fetches it.
    Notify,
    /// Fetch every tick.
    Poll,
}

fn default_near() -> f32 {
    0.3
}

fn default_far() -> f32 {
    1000.0
}

fn default_extrinsics_key() -> String {
    "extrinsics".into()
}

fn default_user_key() -> String {
    "user:position".into()
}

fn default_true() -> bool {
    true
}

/// One configured service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceSpec {
    /// Calibrate an engine camera from `<camera>:calibration`.
    Camera {
        /// Base key of the camera.
        camera: String,
        /// Sensor role.
        #[serde(default)]
        role: CameraRole,
        /// Near clip plane.
        #[serde(default = "default_near")]
        near: f32,
        /// Far clip plane.
        #[serde(default = "default_far")]
        far: f32,
    },
    /// Place an object from `<object>:<key>`.
    Extrinsics {
        /// Object name (lower-cased into the key).
        object: String,
        /// Key suffix.
        #[serde(default = "default_extrinsics_key")]
        key: String,
        /// Pre-multiply `scale(1,-1,1)`.
        #[serde(default = "default_true")]
        reverse_y: bool,
        /// Follow updates instead of loading once.
        #[serde(default)]
        keep_tracking: bool,
    },
    /// Follow a tracked sheet on `<camera>:pose`.
    Pose {
        /// Object the pose is applied to.
        object: String,
        /// Tracking camera base key.
        camera: String,
    },
    /// Show frames from `key` on a texture.
    Video {
        /// Base key of the image.
        key: String,
        /// Delivery mode.
        #[serde(default)]
        feed: VideoFeed,
        /// Draw detected markers on RGB frames.
        #[serde(default)]
        markers: bool,
    },
    /// Load one image from `key` into a texture.
    Texture {
        /// Base key of the image.
        key: String,
    },
    /// Seat a viewer object at the table position minus `key`'s offset.
    User {
        /// Object placed.
        object: String,
        /// Object whose recorded pose locates the table.
        table: String,
        /// Full key of the `{x, y, z}` offset.
        #[serde(default = "default_user_key")]
        key: String,
    },
    /// Turn a 16-bit depth stream into point-cloud chunks.
    PointCloud {
        /// Base key of the depth image.
        key: String,
        /// Camera whose calibration back-projects the depth.
        camera: String,
    },
}
