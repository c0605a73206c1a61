// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Feature sessions for the table client.
//!
//! Every feature (camera calibration, object extrinsics, sheet pose, video,
//! static textures, point clouds) runs inside the same [`ServiceSession`]
//! retry state machine and differs only in its [`Feature`] strategy. A
//! [`Table`] owns the store link, the shared [`TableContext`], and steps the
//! sessions from a single tick.

pub mod build;
mod context;
mod feature;
pub mod features;
mod session;
mod sink;
mod table;

pub use context::{CameraRecord, TableContext};
pub use feature::{Feature, FeatureCx, Fetch, LoadError};
pub use session::{ConnectionState, ServiceSession, SessionError, StepCx};
pub use sink::RenderSink;
pub use table::Table;
