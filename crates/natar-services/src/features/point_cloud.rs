// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Depth stream to chunked point meshes.

use crate::feature::{Feature, FeatureCx, Fetch, LoadError};
use natar_store_client::{StoreError, StoreHandle};
use natar_store_proto::{suffix, ChannelKey};
use natar_vision::{build_chunks, depth16_to_meters_into, PointCloud, MAX_VERTICES_PER_CHUNK};
use tracing::debug;

/// Back-projects each depth frame through a camera's intrinsics.
#[derive(Debug)]
pub struct PointCloudBuilder {
    key: ChannelKey,
    camera: Option<String>,
    max_vertices: usize,
    shape: Option<(usize, usize)>,
    pending: Option<Vec<u8>>,
    depth: Vec<f32>,
}

impl PointCloudBuilder {
    /// Build clouds from `key` using `camera`'s calibration. `None` leaves
    /// the session misconfigured.
    pub fn new(key: impl Into<String>, camera: Option<String>) -> Self {
        Self {
            key: ChannelKey::new(key),
            camera,
            max_vertices: MAX_VERTICES_PER_CHUNK,
            shape: None,
            pending: None,
            depth: Vec::new(),
        }
    }

    /// Override the per-chunk vertex ceiling.
    pub fn with_max_vertices(mut self, max_vertices: usize) -> Self {
        self.max_vertices = max_vertices;
        self
    }
}

impl Feature for PointCloudBuilder {
    fn name(&self) -> &str {
        self.key.as_str()
    }

    fn control_key(&self) -> &str {
        self.key.as_str()
    }

    fn try_load(
        &mut self,
        store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), LoadError> {
        let Some(camera) = &self.camera else {
            return Err(LoadError::Configuration(format!(
                "no depth camera for {}",
                self.key
            )));
        };
        let channels_key = self.key.join(suffix::CHANNELS);
        let mut fetch = Fetch::new(store);
        let width = fetch.number::<usize>(&self.key.join(suffix::WIDTH))?;
        let height = fetch.number::<usize>(&self.key.join(suffix::HEIGHT))?;
        let channels = fetch.number::<usize>(&channels_key)?;
        let (Some(width), Some(height), Some(channels)) = (width, height, channels) else {
            return Err(fetch.into_missing());
        };
        if channels != 2 {
            return Err(LoadError::decode(
                &channels_key,
                format!("expected 16-bit depth, got {channels} channels"),
            ));
        }
        if cx.table.intrinsics(camera).is_none() {
            return Err(LoadError::Waiting(format!("calibration of {camera}")));
        }
        self.shape = Some((width, height));
        Ok(())
    }

    fn channel(&self) -> Option<ChannelKey> {
        Some(self.key.clone())
    }

    fn on_message(&mut self, payload: Vec<u8>, _cx: &mut FeatureCx<'_>) {
        self.pending = Some(payload);
    }

    fn update(
        &mut self,
        _store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), StoreError> {
        let (Some(raw), Some((width, height)), Some(camera)) =
            (self.pending.take(), self.shape, self.camera.as_deref())
        else {
            return Ok(());
        };
        if let Err(err) = depth16_to_meters_into(&raw, width, height, &mut self.depth) {
            debug!(key = %self.key, %err, "depth frame dropped");
            return Ok(());
        }
        let Some(intrinsics) = cx.table.intrinsics(camera) else {
            return Ok(());
        };
        let cloud = PointCloud::from_depth(&self.depth, width, intrinsics);
        let chunks = build_chunks(&cloud.points, &cloud.colors, self.max_vertices);
        debug!(key = %self.key, points = cloud.len(), chunks = chunks.len(), "point cloud");
        cx.sink.replace_point_cloud(self.key.as_str(), chunks);
        Ok(())
    }

    fn reset(&mut self) {
        self.pending = None;
    }
}
