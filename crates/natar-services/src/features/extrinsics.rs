// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Place an object from `<object>:<key>`, once or continuously.

use crate::feature::{Feature, FeatureCx, LoadError};
use glam::{Mat4, Vec3};
use natar_store_client::{StoreError, StoreHandle};
use natar_store_proto::{suffix, ChannelKey};
use natar_vision::{decompose, ExtrinsicsRecord};
use tracing::debug;

/// Applies a stored extrinsics matrix to an object.
#[derive(Debug, Clone)]
pub struct ExtrinsicsFollower {
    object: String,
    key: ChannelKey,
    reverse_y: bool,
    keep_tracking: bool,
    current: Option<Mat4>,
}

impl ExtrinsicsFollower {
    /// Follow `<object>:extrinsics` once, Y reversed.
    pub fn new(object: impl Into<String>) -> Self {
        let object = object.into();
        Self {
            key: ChannelKey::for_object(&object, suffix::EXTRINSICS),
            object,
            reverse_y: true,
            keep_tracking: false,
            current: None,
        }
    }

    /// Read `<object>:<key>` instead.
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = ChannelKey::for_object(&self.object, key);
        self
    }

    /// Toggle the `scale(1,-1,1)` pre-multiply.
    pub fn with_reverse_y(mut self, reverse_y: bool) -> Self {
        self.reverse_y = reverse_y;
        self
    }

    /// Subscribe and keep applying updates.
    pub fn with_tracking(mut self, keep_tracking: bool) -> Self {
        self.keep_tracking = keep_tracking;
        self
    }

    fn apply(&self, matrix: Mat4, cx: &mut FeatureCx<'_>) {
        let placed = if self.reverse_y {
            Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * matrix
        } else {
            matrix
        };
        cx.sink.set_transform(&self.object, decompose(placed, false));
        cx.table.set_object_pose(&self.object, placed);
    }
}

impl Feature for ExtrinsicsFollower {
    fn name(&self) -> &str {
        &self.object
    }

    fn control_key(&self) -> &str {
        self.key.as_str()
    }

    fn try_load(
        &mut self,
        store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), LoadError> {
        let Some(raw) = store.get(self.key.as_str())? else {
            return Err(LoadError::Missing(vec![self.key.to_string()]));
        };
        let matrix = ExtrinsicsRecord::from_json(&raw)
            .map_err(|e| LoadError::decode(&self.key, e))?
            .to_mat4();
        self.apply(matrix, cx);
        self.current = Some(matrix);
        Ok(())
    }

    fn channel(&self) -> Option<ChannelKey> {
        self.keep_tracking.then(|| self.key.clone())
    }

    fn on_message(&mut self, payload: Vec<u8>, _cx: &mut FeatureCx<'_>) {
        match ExtrinsicsRecord::from_json(&payload) {
            Ok(record) => self.current = Some(record.to_mat4()),
            Err(err) => debug!(key = %self.key, %err, "extrinsics update dropped"),
        }
    }

    fn update(
        &mut self,
        _store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), StoreError> {
        if self.keep_tracking {
            if let Some(matrix) = self.current {
                self.apply(matrix, cx);
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.current = None;
    }
}
