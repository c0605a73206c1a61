// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port for the rendering layer. Sessions hand finished artifacts across it
//! and never touch engine objects directly.

use glam::Mat4;
use natar_vision::{FrameBuffer, PointCloudChunk, Pose};

/// Receiver of decoded artifacts, keyed by the engine object they target.
pub trait RenderSink {
    /// Upload an RGB24 display buffer to the texture named `target`.
    fn upload_texture(&mut self, target: &str, frame: &FrameBuffer);
    /// Replace the projection matrix of `camera`.
    fn set_projection(&mut self, camera: &str, projection: Mat4);
    /// Move `object` (local transform).
    fn set_transform(&mut self, object: &str, pose: Pose);
    /// Swap the point meshes under `target` for a new chunk set.
    fn replace_point_cloud(&mut self, target: &str, chunks: Vec<PointCloudChunk>);
}
