// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Follow a tracked sheet on `<camera>:pose`.

use crate::feature::{Feature, FeatureCx, LoadError};
use glam::Mat4;
use natar_store_client::{StoreError, StoreHandle};
use natar_store_proto::{suffix, ChannelKey};
use natar_vision::{decompose, parse_pose};
use tracing::debug;

/// Moves an object with the pose a tracking camera publishes.
#[derive(Debug, Clone)]
pub struct PoseFollower {
    object: String,
    camera: Option<String>,
    channel: Option<ChannelKey>,
    pending: Option<Mat4>,
}

impl PoseFollower {
    /// Follow `camera`'s pose feed. `None` leaves the session misconfigured.
    pub fn new(object: impl Into<String>, camera: Option<String>) -> Self {
        Self {
            channel: camera
                .as_deref()
                .map(|c| ChannelKey::new(c).join(suffix::POSE)),
            object: object.into(),
            camera,
            pending: None,
        }
    }
}

impl Feature for PoseFollower {
    fn name(&self) -> &str {
        &self.object
    }

    fn control_key(&self) -> &str {
        self.camera.as_deref().unwrap_or(&self.object)
    }

    fn try_load(
        &mut self,
        _store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), LoadError> {
        let Some(camera) = &self.camera else {
            return Err(LoadError::Configuration(format!(
                "no tracking camera for {}",
                self.object
            )));
        };
        if cx.table.intrinsics(camera).is_none() {
            return Err(LoadError::Waiting(format!("calibration of {camera}")));
        }
        Ok(())
    }

    fn channel(&self) -> Option<ChannelKey> {
        self.channel.clone()
    }

    fn on_message(&mut self, payload: Vec<u8>, _cx: &mut FeatureCx<'_>) {
        match parse_pose(&payload) {
            Ok(matrix) => self.pending = Some(matrix),
            Err(err) => debug!(object = %self.object, %err, "pose dropped"),
        }
    }

    fn update(
        &mut self,
        _store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), StoreError> {
        if let Some(matrix) = self.pending.take() {
            cx.sink.set_transform(&self.object, decompose(matrix, false));
            cx.table.set_object_pose(&self.object, matrix);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.pending = None;
    }
}
