// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Concrete feature strategies.

mod camera;
mod extrinsics;
mod point_cloud;
mod pose;
mod texture;
mod user;
mod video;

pub use camera::CameraSetup;
pub use extrinsics::ExtrinsicsFollower;
pub use point_cloud::PointCloudBuilder;
pub use pose::PoseFollower;
pub use texture::TextureLoader;
pub use user::UserFollower;
pub use video::VideoPlayer;
