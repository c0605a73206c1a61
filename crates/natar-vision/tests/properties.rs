// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
use approx::assert_relative_eq;
use glam::{Mat4, Quat, Vec3, Vec4};
use natar_vision::{
    build_chunks, decompose, depth16_to_intensity, depth_intensity, IntrinsicsRecord,
    DEPTH_DISPLAY_MAX_MM,
};
use proptest::prelude::*;

fn unit_quat() -> impl Strategy<Value = Quat> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
        .prop_filter("non-degenerate", |(x, y, z, w)| {
            x * x + y * y + z * z + w * w > 0.01
        })
        .prop_map(|(x, y, z, w)| Quat::from_xyzw(x, y, z, w).normalize())
}

proptest! {
    #[test]
    fn projection_bottom_rows_are_fixed(
        fx in 100.0f32..2000.0,
        fy in 100.0f32..2000.0,
        cx in 0.0f32..1920.0,
        cy in 0.0f32..1080.0,
        width in 16u32..4096,
        height in 16u32..4096,
        near in 0.01f32..10.0,
        span in 0.5f32..1000.0,
    ) {
        let far = near + span;
        let intr = IntrinsicsRecord { fx, fy, cx, cy, width, height, intrinsics: Vec::new() };
        let m = intr.projection_matrix(near, far);
        prop_assert_eq!(m.row(3), Vec4::new(0.0, 0.0, -1.0, 0.0));
        let expected = -near * (1.0 + (far + near) / (far - near));
        prop_assert_eq!(m.row(2)[3], expected);
    }

    #[test]
    fn intensity_is_monotonic_and_saturates(a in any::<u16>(), b in any::<u16>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(depth_intensity(lo) <= depth_intensity(hi));
        if hi >= DEPTH_DISPLAY_MAX_MM {
            prop_assert_eq!(depth_intensity(hi), 255);
        }
    }

    #[test]
    fn intensity_is_replicated_per_pixel(samples in prop::collection::vec(any::<u16>(), 1..64)) {
        let raw: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let out = depth16_to_intensity(&raw, samples.len(), 1).unwrap();
        for (s, px) in samples.iter().zip(out.chunks_exact(3)) {
            let v = depth_intensity(*s);
            prop_assert_eq!(px, &[v, v, v][..]);
        }
    }

    #[test]
    fn chunks_partition_the_cloud(n in 0usize..2000, max in 1usize..300) {
        let points: Vec<Vec3> = (0..n).map(|i| Vec3::splat(i as f32)).collect();
        let chunks = build_chunks(&points, &[], max);
        prop_assert_eq!(chunks.len(), n.div_ceil(max));
        prop_assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), n);
        if let Some((last, full)) = chunks.split_last() {
            prop_assert!(full.iter().all(|c| c.len() == max));
            prop_assert!(last.len() >= 1 && last.len() <= max);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            // Points are increasing, so the local minimum is the first one.
            prop_assert_eq!(chunk.offset, points[i * max]);
            prop_assert_eq!(chunk.indices.len(), chunk.len());
        }
    }

    #[test]
    fn decomposition_recovers_composed_pose(
        q in unit_quat(),
        p in (-100.0f32..100.0, -100.0f32..100.0, -100.0f32..100.0),
    ) {
        let position = Vec3::new(p.0, p.1, p.2);
        let pose = decompose(Mat4::from_rotation_translation(q, position), false);
        prop_assert_eq!(pose.position, position);
        // Same rotation up to the quaternion double cover.
        let dot = pose.rotation.dot(q).abs();
        assert_relative_eq!(dot, 1.0, epsilon = 1e-4);
    }
}
