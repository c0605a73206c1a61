// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Depth maps to renderable point-cloud chunks.
//!
//! A single point mesh in the target engine holds at most
//! [`MAX_VERTICES_PER_CHUNK`] vertices, so a cloud is emitted as an ordered
//! list of chunks. Chunk `i` owns source points `[i*max, min((i+1)*max, N))`.

use crate::frame::DEPTH_DISPLAY_MAX_MM;
use crate::params::IntrinsicsRecord;
use glam::{Vec3, Vec4};

/// Vertex ceiling of one point mesh.
pub const MAX_VERTICES_PER_CHUNK: usize = 65000;

/// One renderable point list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointCloudChunk {
    /// Vertices relative to `offset`.
    pub points: Vec<Vec3>,
    /// RGBA per vertex.
    pub colors: Vec<Vec4>,
    /// Point topology: vertex `k` has index `k`.
    pub indices: Vec<u32>,
    /// Componentwise minimum subtracted from every point; place the mesh here.
    pub offset: Vec3,
}

impl PointCloudChunk {
    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the chunk holds no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Split `points` into chunks of at most `max_vertices_per_chunk` vertices.
///
/// `colors` pairs with `points` by index; missing colors default to white.
/// A `max_vertices_per_chunk` of zero is treated as one.
pub fn build_chunks(
    points: &[Vec3],
    colors: &[Vec4],
    max_vertices_per_chunk: usize,
) -> Vec<PointCloudChunk> {
    let max = max_vertices_per_chunk.max(1);
    points
        .chunks(max)
        .enumerate()
        .map(|(i, slice)| {
            let start = i * max;
            let offset = slice
                .iter()
                .fold(Vec3::splat(f32::INFINITY), |acc, p| acc.min(*p));
            PointCloudChunk {
                points: slice.iter().map(|p| *p - offset).collect(),
                colors: (start..start + slice.len())
                    .map(|k| colors.get(k).copied().unwrap_or(Vec4::ONE))
                    .collect(),
                indices: (0..slice.len() as u32).collect(),
                offset,
            }
        })
        .collect()
}

/// Dense depth frame back-projected into camera space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointCloud {
    /// Camera-space points, meters.
    pub points: Vec<Vec3>,
    /// Grey color per point from its depth.
    pub colors: Vec<Vec4>,
}

impl PointCloud {
    /// Back-project every pixel of a row-major depth map (meters). Zero and
    /// non-finite samples carry no measurement and are skipped.
    pub fn from_depth(depth_m: &[f32], width: usize, intrinsics: &IntrinsicsRecord) -> Self {
        let mut cloud = Self::default();
        if width == 0 {
            return cloud;
        }
        let ceiling = f32::from(DEPTH_DISPLAY_MAX_MM) / 1000.0;
        for (i, &d) in depth_m.iter().enumerate() {
            if !(d.is_finite() && d > 0.0) {
                continue;
            }
            let (x, y) = ((i % width) as f32, (i / width) as f32);
            cloud.points.push(intrinsics.back_project(x, y, d));
            let g = (d / ceiling).min(1.0);
            cloud.colors.push(Vec4::new(g, g, g, 1.0));
        }
        cloud
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no pixel carried depth.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Chunk with the engine's vertex ceiling.
    pub fn chunks(&self) -> Vec<PointCloudChunk> {
        build_chunks(&self.points, &self.colors, MAX_VERTICES_PER_CHUNK)
    }
}
