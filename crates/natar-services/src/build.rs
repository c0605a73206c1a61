// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sessions and link settings from saved preferences.

use crate::features::{
    CameraSetup, ExtrinsicsFollower, PointCloudBuilder, PoseFollower, TextureLoader, UserFollower,
    VideoPlayer,
};
use crate::session::ServiceSession;
use natar_app_core::prefs::{ServiceSpec, StorePrefs, TablePrefs};
use natar_store_client::LinkConfig;
use std::time::Duration;
use tracing::warn;

/// Link settings from the `store` section of the preferences.
pub fn link_config(prefs: &StorePrefs) -> LinkConfig {
    LinkConfig {
        host: prefs.host.clone(),
        port: prefs.port,
        nodelay: prefs.nodelay,
        io_timeout: Duration::from_millis(prefs.io_timeout_ms),
        ping_interval: Duration::from_millis(prefs.ping_interval_ms),
        reconnect_interval: Duration::from_millis(prefs.reconnect_interval_ms),
        queue_depth: prefs.queue_depth.max(1),
    }
}

/// One session per configured service, in order.
///
/// Pose and point-cloud services must name a camera that also has a camera
/// service; otherwise their session reports a configuration error on its
/// first load.
pub fn sessions_from_prefs(prefs: &TablePrefs) -> Vec<ServiceSession> {
    let cameras: Vec<&str> = prefs
        .services
        .iter()
        .filter_map(|spec| match spec {
            ServiceSpec::Camera { camera, .. } => Some(camera.as_str()),
            _ => None,
        })
        .collect();
    let retry = Duration::from_millis(prefs.load_retry_ms);
    prefs
        .services
        .iter()
        .map(|spec| session_for(spec, &cameras).with_retry_interval(retry))
        .collect()
}

fn known_camera(camera: &str, cameras: &[&str]) -> Option<String> {
    if cameras.contains(&camera) {
        Some(camera.to_string())
    } else {
        warn!(%camera, "no camera service configured for this name");
        None
    }
}

/// Session for one service spec. `cameras` lists the configured camera
/// names.
pub fn session_for(spec: &ServiceSpec, cameras: &[&str]) -> ServiceSession {
    match spec {
        ServiceSpec::Camera {
            camera,
            role,
            near,
            far,
        } => ServiceSession::new(Box::new(
            CameraSetup::new(camera.clone(), *role).with_clip(*near, *far),
        )),
        ServiceSpec::Extrinsics {
            object,
            key,
            reverse_y,
            keep_tracking,
        } => ServiceSession::new(Box::new(
            ExtrinsicsFollower::new(object.clone())
                .with_key(key)
                .with_reverse_y(*reverse_y)
                .with_tracking(*keep_tracking),
        )),
        ServiceSpec::Pose { object, camera } => ServiceSession::new(Box::new(PoseFollower::new(
            object.clone(),
            known_camera(camera, cameras),
        ))),
        ServiceSpec::Video { key, feed, markers } => ServiceSession::new(Box::new(
            VideoPlayer::new(key.clone(), *feed).with_markers(*markers),
        )),
        ServiceSpec::Texture { key } => {
            ServiceSession::new(Box::new(TextureLoader::new(key.clone())))
        }
        ServiceSpec::User { object, table, key } => ServiceSession::new(Box::new(
            UserFollower::new(object.clone(), table.clone()).with_key(key.clone()),
        )),
        ServiceSpec::PointCloud { key, camera } => ServiceSession::new(Box::new(
            PointCloudBuilder::new(key.clone(), known_camera(camera, cameras)),
        )),
    }
}
