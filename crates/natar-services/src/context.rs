// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cross-feature data shared by the sessions of one table.
//!
//! Built once at startup and lent to each session per tick. A projector
//! session, for example, reads the depth camera's calibration from here.

use glam::Mat4;
use natar_vision::IntrinsicsRecord;
use std::collections::BTreeMap;

/// Calibration published by a camera session.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRecord {
    /// Pinhole calibration.
    pub intrinsics: IntrinsicsRecord,
    /// Camera pose, when the role carries one.
    pub extrinsics: Option<Mat4>,
}

/// Calibrations and poses known to the table, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableContext {
    cameras: BTreeMap<String, CameraRecord>,
    poses: BTreeMap<String, Mat4>,
}

impl TableContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) a camera's calibration.
    pub fn set_camera(&mut self, name: &str, record: CameraRecord) {
        self.cameras.insert(name.to_string(), record);
    }

    /// Calibration of `name`, if loaded.
    pub fn camera(&self, name: &str) -> Option<&CameraRecord> {
        self.cameras.get(name)
    }

    /// Shorthand for the intrinsics of `name`.
    pub fn intrinsics(&self, name: &str) -> Option<&IntrinsicsRecord> {
        self.cameras.get(name).map(|c| &c.intrinsics)
    }

    /// Record the latest transform applied to `object`, after any Y
    /// reversal, so its translation is the object's scene position.
    pub fn set_object_pose(&mut self, object: &str, pose: Mat4) {
        self.poses.insert(object.to_string(), pose);
    }

    /// Latest transform applied to `object`.
    pub fn object_pose(&self, object: &str) -> Option<Mat4> {
        self.poses.get(object).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CameraRecord {
        CameraRecord {
            intrinsics: IntrinsicsRecord {
                fx: 500.0,
                fy: 500.0,
                cx: 320.0,
                cy: 240.0,
                width: 640,
                height: 480,
                intrinsics: Vec::new(),
            },
            extrinsics: None,
        }
    }

    #[test]
    fn cameras_are_replaced_by_name() {
        let mut cx = TableContext::new();
        assert!(cx.intrinsics("depth").is_none());
        cx.set_camera("depth", record());
        let mut moved = record();
        moved.extrinsics = Some(Mat4::IDENTITY);
        cx.set_camera("depth", moved);
        assert_eq!(cx.cameras.len(), 1);
        assert_eq!(cx.camera("depth").and_then(|c| c.extrinsics), Some(Mat4::IDENTITY));
    }
}
