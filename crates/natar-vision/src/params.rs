// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Camera parameter records and the math that turns them into engine values.
//!
//! Conventions:
//! - Records on the wire are row-major; glam matrices are column-major, so
//!   every conversion transposes exactly once.
//! - Rotations come from a look-rotation of the forward (column 2) and up
//!   (column 1) axes, not from a generic matrix-to-quaternion decomposition.
//!   Non-orthonormal producer matrices therefore keep their forward axis.

use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default near clip plane for calibrated cameras.
pub const DEFAULT_NEAR: f32 = 0.3;
/// Default far clip plane for calibrated cameras.
pub const DEFAULT_FAR: f32 = 1000.0;

/// Parameter decoding failures.
#[derive(Debug, Error)]
pub enum ParamError {
    /// JSON record did not parse.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// A matrix needs exactly 16 values.
    #[error("matrix has {0} values, expected 16")]
    MatrixLen(usize),
    /// A token in a text matrix is not a number.
    #[error("not a number: {0:?}")]
    Number(String),
    /// Focal lengths or resolution are zero, negative, or not finite.
    #[error("degenerate intrinsics: {0}")]
    Intrinsics(&'static str),
}

/// Pinhole calibration of one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicsRecord {
    /// Focal length along x, in pixels.
    pub fx: f32,
    /// Focal length along y, in pixels.
    pub fy: f32,
    /// Principal point x, in pixels.
    pub cx: f32,
    /// Principal point y, in pixels.
    pub cy: f32,
    /// Sensor width in pixels.
    pub width: u32,
    /// Sensor height in pixels.
    pub height: u32,
    /// Raw 3x3 camera matrix as published, if any.
    #[serde(default)]
    pub intrinsics: Vec<f32>,
}

impl IntrinsicsRecord {
    /// Parse and sanity-check a calibration payload.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ParamError> {
        let record: Self = serde_json::from_slice(bytes)?;
        record.validate()?;
        Ok(record)
    }

    /// Reject records that would divide by zero downstream.
    pub fn validate(&self) -> Result<(), ParamError> {
        let usable = |v: f32| v.is_finite() && v > 0.0;
        if !usable(self.fx) || !usable(self.fy) {
            return Err(ParamError::Intrinsics("focal length"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ParamError::Intrinsics("resolution"));
        }
        Ok(())
    }

    /// Clip-space projection from physical calibration.
    ///
    /// Rows:
    /// ```text
    /// [2fx/w, 0,     1 - 2cx/w, 0                    ]
    /// [0,     2fy/h, 1 - 2cy/h, 0                    ]
    /// [0,     0,     -(f+n)/(f-n), -n(1 + (f+n)/(f-n))]
    /// [0,     0,     -1,        0                    ]
    /// ```
    pub fn projection_matrix(&self, near: f32, far: f32) -> Mat4 {
        let w = self.width as f32;
        let h = self.height as f32;
        let depth = (far + near) / (far - near);
        let rows = [
            [2.0 * self.fx / w, 0.0, 1.0 - 2.0 * self.cx / w, 0.0],
            [0.0, 2.0 * self.fy / h, 1.0 - 2.0 * self.cy / h, 0.0],
            [0.0, 0.0, -depth, -near * (1.0 + depth)],
            [0.0, 0.0, -1.0, 0.0],
        ];
        Mat4::from_cols_array_2d(&rows).transpose()
    }

    /// Pixel plus depth (meters) to a camera-space point.
    pub fn back_project(&self, pixel_x: f32, pixel_y: f32, depth: f32) -> Vec3 {
        Vec3::new(
            (pixel_x - self.cx) * depth / self.fx,
            (pixel_y - self.cy) * depth / self.fy,
            depth,
        )
    }
}

/// 4x4 homogeneous transform as published (row-major).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicsRecord {
    /// Row-major elements.
    pub matrix: [f32; 16],
}

impl ExtrinsicsRecord {
    /// Parse `{"matrix":[16 floats]}`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ParamError> {
        #[derive(Deserialize)]
        struct Raw {
            matrix: Vec<f32>,
        }
        let raw: Raw = serde_json::from_slice(bytes)?;
        let matrix: [f32; 16] = raw
            .matrix
            .try_into()
            .map_err(|v: Vec<f32>| ParamError::MatrixLen(v.len()))?;
        Ok(Self { matrix })
    }

    /// Column-major glam matrix.
    pub fn to_mat4(&self) -> Mat4 {
        row_major_to_mat4(&self.matrix)
    }
}

/// Point published as `{"x":..,"y":..,"z":..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl PositionRecord {
    /// Parse the JSON payload.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ParamError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// As a glam vector.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Viewer pose `offset` away from `target`, turned to face it with the
/// image-down axis as up.
pub fn facing(target: Vec3, offset: Vec3) -> Pose {
    let position = target - offset;
    Pose {
        position,
        rotation: look_rotation(target - position, Vec3::NEG_Y),
    }
}

/// Interpret 16 row-major floats as a glam matrix.
pub fn row_major_to_mat4(values: &[f32; 16]) -> Mat4 {
    Mat4::from_cols_array(values).transpose()
}

/// Position and orientation extracted from a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation (column 3).
    pub position: Vec3,
    /// Look-rotation of columns 2 and 1.
    pub rotation: Quat,
}

/// Decompose a row-major extrinsics matrix. With `reverse_y`, `scale(1,-1,1)`
/// is pre-multiplied first.
pub fn decompose_extrinsics(matrix: &[f32; 16], reverse_y: bool) -> Pose {
    decompose(row_major_to_mat4(matrix), reverse_y)
}

/// [`decompose_extrinsics`] for a matrix already in glam layout.
pub fn decompose(matrix: Mat4, reverse_y: bool) -> Pose {
    let m = if reverse_y {
        Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * matrix
    } else {
        matrix
    };
    Pose {
        position: m.w_axis.truncate(),
        rotation: look_rotation(m.z_axis.truncate(), m.y_axis.truncate()),
    }
}

/// Rotation whose +Z points along `forward` and whose +Y is as close to `up`
/// as the constraint allows.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let Some(z) = forward.try_normalize() else {
        return Quat::IDENTITY;
    };
    let Some(x) = up.cross(z).try_normalize() else {
        return Quat::from_rotation_arc(Vec3::Z, z);
    };
    let y = z.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize()
}

/// Parse a tracked pose: either an extrinsics JSON record or a bare text
/// matrix such as `[[1, 0, 0, 0], [0, 1, 0, 0], ...]` (row-major).
pub fn parse_pose(bytes: &[u8]) -> Result<Mat4, ParamError> {
    if let Ok(record) = ExtrinsicsRecord::from_json(bytes) {
        return Ok(record.to_mat4());
    }
    parse_pose_text(&String::from_utf8_lossy(bytes))
}

/// Text form of [`parse_pose`]. Brackets, commas, and whitespace separate
/// values.
pub fn parse_pose_text(text: &str) -> Result<Mat4, ParamError> {
    let values = text
        .split(|c: char| c == ',' || c == '[' || c == ']' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f32>()
                .map_err(|_| ParamError::Number(tok.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let values: [f32; 16] = values
        .try_into()
        .map_err(|v: Vec<f32>| ParamError::MatrixLen(v.len()))?;
    Ok(row_major_to_mat4(&values))
}
