// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pure image and geometry code for the table: no I/O, no threads.
//!
//! - [`frame`]: raw RGB / 16-bit depth payloads into RGB24 display buffers.
//! - [`markers`]: detected-marker records and their debug overlay.
//! - [`params`]: intrinsics/extrinsics records, projection, decomposition.
//! - [`cloud`]: depth back-projection and vertex-bounded chunking.

pub mod cloud;
pub mod frame;
pub mod markers;
pub mod params;

pub use cloud::{build_chunks, PointCloud, PointCloudChunk, MAX_VERTICES_PER_CHUNK};
pub use frame::{
    depth16_to_intensity, depth16_to_intensity_into, depth16_to_meters_into, depth_intensity,
    rgb_from_raw, FrameBuffer, FrameError, FrameNotice, PixelFormat, DEPTH_DISPLAY_MAX_MM,
};
pub use markers::{overlay_markers, Marker, MarkerSet};
pub use params::{
    decompose, decompose_extrinsics, facing, look_rotation, parse_pose, ExtrinsicsRecord,
    IntrinsicsRecord, ParamError, Pose, PositionRecord, DEFAULT_FAR, DEFAULT_NEAR,
};
