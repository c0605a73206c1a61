// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless render sink: records what would be drawn and reports rates.

use glam::Mat4;
use natar_services::RenderSink;
use natar_vision::{FrameBuffer, PointCloudChunk, Pose};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Rolling tick-time window.
#[derive(Clone, Debug)]
pub struct PerfStats {
    frame_ms: VecDeque<f32>,
    max_samples: usize,
}

impl Default for PerfStats {
    fn default() -> Self {
        Self {
            frame_ms: VecDeque::with_capacity(400),
            max_samples: 400,
        }
    }
}

impl PerfStats {
    pub fn push(&mut self, frame: f32) {
        if self.frame_ms.len() == self.max_samples {
            self.frame_ms.pop_front();
        }
        self.frame_ms.push_back(frame);
    }

    pub fn mean_ms(&self) -> f32 {
        if self.frame_ms.is_empty() {
            return 0.0;
        }
        self.frame_ms.iter().sum::<f32>() / self.frame_ms.len() as f32
    }

    pub fn fps(&self) -> f32 {
        let mean = self.mean_ms();
        if mean > 0.0 {
            1000.0 / mean
        } else {
            0.0
        }
    }
}

/// Logs artifacts instead of drawing them.
pub struct TracingSink {
    perf: PerfStats,
    uploads: BTreeMap<String, u64>,
    last_tick: Option<Instant>,
    last_report: Option<Instant>,
    report_every: Duration,
}

impl TracingSink {
    pub fn new(report_every: Duration) -> Self {
        Self {
            perf: PerfStats::default(),
            uploads: BTreeMap::new(),
            last_tick: None,
            last_report: None,
            report_every,
        }
    }

    /// Close a tick; every `report_every` log tick rate and upload rates.
    pub fn end_tick(&mut self, now: Instant) {
        if let Some(prev) = self.last_tick.replace(now) {
            self.perf
                .push(now.saturating_duration_since(prev).as_secs_f32() * 1000.0);
        }
        let since = *self.last_report.get_or_insert(now);
        let elapsed = now.saturating_duration_since(since);
        if self.report_every.is_zero() || elapsed < self.report_every {
            return;
        }
        let secs = elapsed.as_secs_f32();
        for (target, count) in &self.uploads {
            info!(%target, fps = *count as f32 / secs, "texture rate");
        }
        info!(tick_hz = self.perf.fps(), mean_ms = self.perf.mean_ms(), "tick rate");
        self.uploads.clear();
        self.last_report = Some(now);
    }
}

impl RenderSink for TracingSink {
    fn upload_texture(&mut self, target: &str, frame: &FrameBuffer) {
        *self.uploads.entry(target.to_string()).or_default() += 1;
        debug!(
            %target,
            width = frame.width(),
            height = frame.height(),
            format = frame.pixel_format(),
            "texture"
        );
    }

    fn set_projection(&mut self, camera: &str, projection: Mat4) {
        info!(%camera, ?projection, "projection");
    }

    fn set_transform(&mut self, object: &str, pose: Pose) {
        debug!(%object, position = ?pose.position, rotation = ?pose.rotation, "transform");
    }

    fn replace_point_cloud(&mut self, target: &str, chunks: Vec<PointCloudChunk>) {
        let points: usize = chunks.iter().map(PointCloudChunk::len).sum();
        debug!(%target, chunks = chunks.len(), points, "point cloud");
    }
}
