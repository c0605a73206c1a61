// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]
//! Recording doubles for the render and control ports.

use glam::Mat4;
use natar_app_core::control_port::{ControlAction, ControlPort};
use natar_services::RenderSink;
use natar_vision::{FrameBuffer, PointCloudChunk, Pose};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub target: String,
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub uploads: Vec<Upload>,
    pub projections: Vec<(String, Mat4)>,
    pub transforms: Vec<(String, Pose)>,
    pub clouds: Vec<(String, Vec<PointCloudChunk>)>,
}

impl RenderSink for RecordingSink {
    fn upload_texture(&mut self, target: &str, frame: &FrameBuffer) {
        self.uploads.push(Upload {
            target: target.to_string(),
            width: frame.width(),
            height: frame.height(),
            data: frame.data().to_vec(),
        });
    }

    fn set_projection(&mut self, camera: &str, projection: Mat4) {
        self.projections.push((camera.to_string(), projection));
    }

    fn set_transform(&mut self, object: &str, pose: Pose) {
        self.transforms.push((object.to_string(), pose));
    }

    fn replace_point_cloud(&mut self, target: &str, chunks: Vec<PointCloudChunk>) {
        self.clouds.push((target.to_string(), chunks));
    }
}

/// Control port that remembers every request.
#[derive(Debug, Clone, Default)]
pub struct RecordingControl {
    calls: Arc<Mutex<Vec<(String, ControlAction)>>>,
}

impl RecordingControl {
    pub fn calls(&self) -> Vec<(String, ControlAction)> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ControlPort for RecordingControl {
    fn request(&self, key: &str, action: ControlAction) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key.to_string(), action));
    }
}

pub const CALIBRATION: &[u8] =
    br#"{"fx":500.0,"fy":500.0,"cx":2.0,"cy":1.0,"width":4,"height":2}"#;

pub fn depth_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
