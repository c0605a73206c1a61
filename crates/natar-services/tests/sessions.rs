// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Session lifecycles driven through a table over the in-memory store.

mod common;

use approx::assert_relative_eq;
use common::{depth_bytes, RecordingControl, RecordingSink, CALIBRATION};
use glam::Vec3;
use natar_app_core::control_port::ControlAction;
use natar_app_core::prefs::{CameraRole, VideoFeed};
use natar_services::features::{
    CameraSetup, ExtrinsicsFollower, PointCloudBuilder, PoseFollower, TextureLoader, UserFollower,
    VideoPlayer,
};
use natar_services::{ConnectionState, Feature, ServiceSession, Table};
use natar_store_client::MemoryStore;
use std::time::{Duration, Instant};

struct Rig {
    store: MemoryStore,
    table: Table<MemoryStore>,
    sink: RecordingSink,
    control: RecordingControl,
}

impl Rig {
    fn new() -> Self {
        let store = MemoryStore::new();
        Self {
            table: Table::new(store.clone()),
            store,
            sink: RecordingSink::default(),
            control: RecordingControl::default(),
        }
    }

    fn add(&mut self, feature: impl Feature + 'static) {
        self.table.add_session(ServiceSession::new(Box::new(feature)));
    }

    fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        self.table.tick(now, &mut self.sink, &self.control);
    }

    fn state(&self, index: usize) -> ConnectionState {
        self.table.sessions()[index].state()
    }

    fn seed_image(&self, key: &str, width: usize, height: usize, channels: usize) {
        self.store.insert(&format!("{key}:width"), width.to_string().as_bytes());
        self.store.insert(&format!("{key}:height"), height.to_string().as_bytes());
        self.store
            .insert(&format!("{key}:channels"), channels.to_string().as_bytes());
    }
}

#[test]
fn missing_width_keeps_video_connected_with_one_start_per_cycle() {
    let mut rig = Rig::new();
    rig.store.insert("camera0:height", b"480");
    rig.store.insert("camera0:channels", b"3");
    rig.add(VideoPlayer::new("camera0", VideoFeed::Stream));

    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Connected);
    assert!(rig.control.calls().is_empty());

    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Connected);
    assert_eq!(
        rig.control.calls(),
        vec![("camera0".to_string(), ControlAction::Start)]
    );

    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Connected);
    assert_eq!(rig.control.calls().len(), 2);
    assert_eq!(rig.table.sessions()[0].failed_loads(), 2);

    rig.store.insert("camera0:width", b"640");
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);
    assert_eq!(rig.control.calls().len(), 2);
    assert_eq!(rig.store.subscriber_count("camera0"), 1);
}

#[test]
fn spaced_retries_nudge_once_per_load_cycle() {
    let mut rig = Rig::new();
    rig.table.add_session(
        ServiceSession::new(Box::new(VideoPlayer::new("camera0", VideoFeed::Stream)))
            .with_retry_interval(Duration::from_secs(5)),
    );
    let start = Instant::now();
    for offset in [0, 1, 2, 7] {
        rig.tick_at(start + Duration::from_secs(offset));
    }
    assert_eq!(rig.state(0), ConnectionState::Connected);
    assert_eq!(rig.table.sessions()[0].failed_loads(), 2);
    assert_eq!(
        rig.control.calls(),
        vec![
            ("camera0".to_string(), ControlAction::Start),
            ("camera0".to_string(), ControlAction::Start)
        ]
    );
}

#[test]
fn streamed_frames_reach_the_texture_and_bad_frames_are_dropped() {
    let mut rig = Rig::new();
    rig.seed_image("camera0", 2, 1, 3);
    rig.add(VideoPlayer::new("camera0", VideoFeed::Stream));
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);

    rig.store.publish("camera0", &[1, 2, 3, 4, 5, 6]);
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 1);
    assert_eq!(rig.sink.uploads[0].data, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(rig.sink.uploads[0].target, "camera0");

    rig.store.publish("camera0", &[9, 9, 9]);
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 1);
    assert_eq!(rig.state(0), ConnectionState::Working);

    rig.store.publish("camera0", &[7, 7, 7, 8, 8, 8]);
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 2);
    assert_eq!(rig.sink.uploads[1].data, vec![7, 7, 7, 8, 8, 8]);
}

#[test]
fn depth_frames_are_shown_as_intensity() {
    let mut rig = Rig::new();
    rig.seed_image("camera0:depth", 2, 1, 2);
    rig.add(VideoPlayer::new("camera0:depth", VideoFeed::Poll));
    rig.store
        .insert("camera0:depth", &depth_bytes(&[1000, 5000]));
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);
    assert_eq!(rig.store.subscriber_count("camera0:depth"), 0);
    rig.tick();
    let upload = rig.sink.uploads.last().unwrap();
    assert_eq!(upload.data, vec![128, 128, 128, 255, 255, 255]);
}

#[test]
fn notify_feed_fetches_once_per_push() {
    let mut rig = Rig::new();
    rig.seed_image("camera0", 1, 1, 3);
    rig.store.insert("camera0", &[10, 20, 30]);
    rig.add(VideoPlayer::new("camera0", VideoFeed::Notify));
    rig.tick();
    rig.tick();
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 1, "first frame needs no push");
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 1);

    rig.store.insert("camera0", &[40, 50, 60]);
    rig.store.publish("camera0", b"1");
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 2);
    assert_eq!(rig.sink.uploads[1].data, vec![40, 50, 60]);
}

#[test]
fn notify_feed_skips_repeated_image_counts() {
    let mut rig = Rig::new();
    rig.seed_image("camera0", 1, 1, 3);
    rig.store.insert("camera0", &[1, 1, 1]);
    rig.add(VideoPlayer::new("camera0", VideoFeed::Notify));
    rig.tick();
    rig.tick();
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 1);

    rig.store.publish("camera0", br#"{"imageCount":5}"#);
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 2);

    rig.store.publish("camera0", br#"{"imageCount":5}"#);
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 2);

    rig.store.insert("camera0", &[2, 2, 2]);
    rig.store.publish("camera0", br#"{"imageCount":6}"#);
    rig.tick();
    assert_eq!(rig.sink.uploads.len(), 3);
    assert_eq!(rig.sink.uploads[2].data, vec![2, 2, 2]);
}

#[test]
fn markers_are_drawn_on_rgb_frames() {
    let mut rig = Rig::new();
    rig.seed_image("camera0", 8, 8, 3);
    rig.store.insert(
        "camera0:detected-markers",
        br#"{"markers":[{"id":1,"corners":[4,4]}]}"#,
    );
    rig.add(VideoPlayer::new("camera0", VideoFeed::Stream).with_markers(true));
    rig.tick();
    rig.tick();
    rig.store.publish("camera0", &[0; 8 * 8 * 3]);
    rig.tick();
    let data = &rig.sink.uploads[0].data;
    let px = |x: usize, y: usize| (y * 8 + x) * 3;
    assert_eq!(&data[px(4, 4)..px(4, 4) + 3], &[0, 255, 0]);
    assert_eq!(&data[px(0, 0)..px(0, 0) + 3], &[0, 0, 0]);
}

#[test]
fn losing_the_store_forces_every_session_down() {
    let mut rig = Rig::new();
    rig.seed_image("camera0", 1, 1, 3);
    rig.add(VideoPlayer::new("camera0", VideoFeed::Stream));
    rig.add(VideoPlayer::new("camera0", VideoFeed::Poll));
    rig.tick();
    rig.tick();
    assert_eq!(rig.table.count_in(ConnectionState::Working), 2);

    rig.store.set_online(false);
    rig.tick();
    assert_eq!(rig.table.count_in(ConnectionState::Disconnected), 2);
    assert_eq!(rig.store.subscriber_count("camera0"), 0);

    rig.tick();
    assert_eq!(rig.table.count_in(ConnectionState::Disconnected), 2);

    rig.store.set_online(true);
    rig.tick();
    assert_eq!(rig.table.count_in(ConnectionState::Connected), 2);
    rig.tick();
    assert_eq!(rig.table.count_in(ConnectionState::Working), 2);
    assert_eq!(rig.store.subscriber_count("camera0"), 1);
}

#[test]
fn camera_calibration_feeds_pose_follower() {
    let mut rig = Rig::new();
    rig.store.insert("camera0:calibration", CALIBRATION);
    rig.store.insert(
        "camera0:extrinsics",
        br#"{"matrix":[1,0,0,0.5, 0,1,0,0, 0,0,1,2, 0,0,0,1]}"#,
    );
    rig.add(CameraSetup::new("camera0", CameraRole::Depth).with_clip(0.1, 10.0));
    rig.add(PoseFollower::new("sheet", Some("camera0".into())));
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);
    assert_eq!(rig.state(1), ConnectionState::Working);
    assert!(rig.control.calls().is_empty());

    let (camera, projection) = &rig.sink.projections[0];
    assert_eq!(camera, "camera0");
    assert_relative_eq!(projection.row(0).x, 2.0 * 500.0 / 4.0);
    let (_, camera_pose) = &rig.sink.transforms[0];
    assert_relative_eq!(camera_pose.position.x, 0.5);
    assert_relative_eq!(camera_pose.position.z, 2.0);
    assert!(rig.table.context().camera("camera0").is_some());

    rig.store
        .publish("camera0:pose", b"[[1, 0, 0, 0.1], [0, 1, 0, 0.2], [0, 0, 1, 0.3], [0, 0, 0, 1]]");
    rig.tick();
    let (object, pose) = rig.sink.transforms.last().unwrap();
    assert_eq!(object, "sheet");
    assert!(pose.position.abs_diff_eq(Vec3::new(0.1, 0.2, 0.3), 1e-6));
    assert!(rig.table.context().object_pose("sheet").is_some());
}

#[test]
fn pose_waits_for_calibration_without_nudging() {
    let mut rig = Rig::new();
    rig.add(CameraSetup::new("camera0", CameraRole::Rgb));
    rig.add(PoseFollower::new("sheet", Some("camera0".into())));
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(1), ConnectionState::Connected);
    assert_eq!(
        rig.control.calls(),
        vec![("camera0".to_string(), ControlAction::Start)]
    );

    rig.store.insert("camera0:calibration", CALIBRATION);
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);
    assert_eq!(rig.state(1), ConnectionState::Working);
    assert_eq!(rig.store.subscriber_count("camera0:pose"), 1);
}

#[test]
fn pose_without_camera_is_misconfigured_for_good() {
    let mut rig = Rig::new();
    rig.add(PoseFollower::new("sheet", None));
    for _ in 0..4 {
        rig.tick();
    }
    let session = &rig.table.sessions()[0];
    assert_eq!(session.state(), ConnectionState::Connected);
    assert!(session.is_misconfigured());
    assert!(rig.control.calls().is_empty());
}

#[test]
fn extrinsics_reverse_y_before_decomposition() {
    let mut rig = Rig::new();
    rig.store.insert(
        "table:extrinsics",
        br#"{"matrix":[1,0,0,1, 0,1,0,2, 0,0,1,3, 0,0,0,1]}"#,
    );
    rig.add(ExtrinsicsFollower::new("Table"));
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);
    let (object, pose) = &rig.sink.transforms[0];
    assert_eq!(object, "Table");
    assert!(pose.position.abs_diff_eq(Vec3::new(1.0, -2.0, 3.0), 1e-6));
    assert_eq!(rig.store.subscriber_count("table:extrinsics"), 0);
}

#[test]
fn tracked_extrinsics_follow_updates() {
    let mut rig = Rig::new();
    rig.store
        .insert("table:extrinsics", br#"{"matrix":[1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1]}"#);
    rig.add(
        ExtrinsicsFollower::new("Table")
            .with_reverse_y(false)
            .with_tracking(true),
    );
    rig.tick();
    rig.tick();
    assert_eq!(rig.store.subscriber_count("table:extrinsics"), 1);
    rig.store.publish(
        "table:extrinsics",
        br#"{"matrix":[1,0,0,4, 0,1,0,5, 0,0,1,6, 0,0,0,1]}"#,
    );
    rig.tick();
    let (_, pose) = rig.sink.transforms.last().unwrap();
    assert!(pose.position.abs_diff_eq(Vec3::new(4.0, 5.0, 6.0), 1e-6));
}

#[test]
fn user_waits_for_table_then_faces_it() {
    let mut rig = Rig::new();
    rig.store.insert(
        "table:extrinsics",
        br#"{"matrix":[1,0,0,1, 0,1,0,2, 0,0,1,3, 0,0,0,1]}"#,
    );
    rig.store.insert("user:position", br#"{"x":0,"y":0,"z":-1}"#);
    rig.add(UserFollower::new("viewer", "Table"));
    rig.add(ExtrinsicsFollower::new("Table"));
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Connected);
    assert_eq!(rig.state(1), ConnectionState::Working);

    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);
    assert!(rig.control.calls().is_empty());
    let (object, pose) = rig.sink.transforms.last().unwrap();
    assert_eq!(object, "viewer");
    assert!(pose.position.abs_diff_eq(Vec3::new(1.0, -2.0, 4.0), 1e-6));
    assert!((pose.rotation * Vec3::Z).abs_diff_eq(Vec3::NEG_Z, 1e-6));
    assert!(rig.table.context().object_pose("viewer").is_some());
    assert_eq!(rig.store.subscriber_count("user:position"), 0);
}

#[test]
fn missing_user_position_nudges_its_key() {
    let mut rig = Rig::new();
    rig.add(UserFollower::new("viewer", "Table"));
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Connected);
    assert_eq!(
        rig.control.calls(),
        vec![("user:position".to_string(), ControlAction::Start)]
    );
}

#[test]
fn depth_stream_becomes_bounded_chunks() {
    let mut rig = Rig::new();
    rig.store.insert("camera0:calibration", CALIBRATION);
    rig.seed_image("camera0:depth", 4, 2, 2);
    rig.add(CameraSetup::new("camera0", CameraRole::Rgb));
    rig.add(
        PointCloudBuilder::new("camera0:depth", Some("camera0".into())).with_max_vertices(3),
    );
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(1), ConnectionState::Working);

    rig.store.publish(
        "camera0:depth",
        &depth_bytes(&[1000, 0, 1000, 1000, 0, 2000, 1500, 1000]),
    );
    rig.tick();
    let (target, chunks) = &rig.sink.clouds[0];
    assert_eq!(target, "camera0:depth");
    let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![3, 3]);
    assert_eq!(chunks[1].indices, vec![0, 1, 2]);
}

#[test]
fn texture_loads_once() {
    let mut rig = Rig::new();
    rig.seed_image("logo", 1, 1, 3);
    rig.add(TextureLoader::new("logo"));
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Connected);
    assert_eq!(
        rig.control.calls(),
        vec![("logo".to_string(), ControlAction::Start)]
    );

    rig.store.insert("logo", &[1, 2, 3]);
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);
    assert_eq!(rig.sink.uploads.len(), 1);
    assert_eq!(rig.sink.uploads[0].data, vec![1, 2, 3]);
}

#[test]
fn reconnect_request_restarts_from_disconnected() {
    let mut rig = Rig::new();
    rig.seed_image("camera0", 1, 1, 3);
    rig.add(VideoPlayer::new("camera0", VideoFeed::Stream));
    rig.tick();
    rig.tick();
    rig.table.sessions_mut()[0].request_reconnect();
    assert_eq!(rig.state(0), ConnectionState::Disconnected);
    assert_eq!(rig.store.subscriber_count("camera0"), 0);
    rig.tick();
    rig.tick();
    assert_eq!(rig.state(0), ConnectionState::Working);
}
