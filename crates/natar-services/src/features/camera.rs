// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Camera calibration: projection from `<camera>:calibration`, transform
//! from `<camera>:extrinsics` for roles that carry one.

use crate::context::CameraRecord;
use crate::feature::{Feature, FeatureCx, Fetch, LoadError};
use natar_app_core::prefs::CameraRole;
use natar_store_client::StoreHandle;
use natar_store_proto::{suffix, ChannelKey};
use natar_vision::{decompose, ExtrinsicsRecord, IntrinsicsRecord, DEFAULT_FAR, DEFAULT_NEAR};

/// One-shot camera setup.
#[derive(Debug, Clone)]
pub struct CameraSetup {
    camera: String,
    key: ChannelKey,
    role: CameraRole,
    near: f32,
    far: f32,
}

impl CameraSetup {
    /// Set up `camera` with default clip planes.
    pub fn new(camera: impl Into<String>, role: CameraRole) -> Self {
        let camera = camera.into();
        Self {
            key: ChannelKey::new(camera.clone()),
            camera,
            role,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Override the clip planes.
    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }
}

impl Feature for CameraSetup {
    fn name(&self) -> &str {
        &self.camera
    }

    fn control_key(&self) -> &str {
        self.key.as_str()
    }

    fn try_load(
        &mut self,
        store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), LoadError> {
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(LoadError::Configuration(format!(
                "clip planes near={} far={}",
                self.near, self.far
            )));
        }
        let calibration_key = self.key.join(suffix::CALIBRATION);
        let extrinsics_key = self.key.join(suffix::EXTRINSICS);

        let mut fetch = Fetch::new(store);
        let calibration = fetch.bytes(&calibration_key)?;
        let extrinsics = if self.role.needs_extrinsics() {
            fetch.bytes(&extrinsics_key)?
        } else {
            None
        };
        let Some(calibration) = calibration.filter(|_| fetch.missing().is_empty()) else {
            return Err(fetch.into_missing());
        };

        let intrinsics = IntrinsicsRecord::from_json(&calibration)
            .map_err(|e| LoadError::decode(&calibration_key, e))?;
        let extrinsics = extrinsics
            .map(|raw| ExtrinsicsRecord::from_json(&raw))
            .transpose()
            .map_err(|e| LoadError::decode(&extrinsics_key, e))?
            .map(|record| record.to_mat4());

        cx.sink
            .set_projection(&self.camera, intrinsics.projection_matrix(self.near, self.far));
        if let Some(matrix) = extrinsics {
            cx.sink.set_transform(&self.camera, decompose(matrix, false));
        }
        cx.table.set_camera(
            &self.camera,
            CameraRecord {
                intrinsics,
                extrinsics,
            },
        );
        Ok(())
    }
}
