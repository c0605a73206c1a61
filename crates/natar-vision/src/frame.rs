// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Raw frame payloads to display pixels.
//!
//! Producers publish either packed 8-bit RGB (3 bytes per pixel) or 16-bit
//! little-endian depth in millimeters (2 bytes per pixel). Display buffers
//! are always RGB24. Every conversion validates the payload length before
//! touching the destination, so a corrupt frame leaves the previous image in
//! place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Depth (mm) mapped to full intensity; deeper samples saturate.
pub const DEPTH_DISPLAY_MAX_MM: u16 = 2000;

/// Bytes per pixel of the display buffer.
pub const DISPLAY_CHANNELS: usize = 3;

/// Frame decoding failures. The offending frame is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Payload size disagrees with the advertised shape.
    #[error("frame is {actual} bytes, expected {expected}")]
    LengthMismatch {
        /// `width * height * channels`.
        expected: usize,
        /// Bytes received.
        actual: usize,
    },
    /// Bytes-per-pixel value this decoder does not handle.
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(usize),
    /// `width * height * channels` overflows or is zero.
    #[error("invalid frame shape {width}x{height}x{channels}")]
    InvalidShape {
        /// Width in pixels.
        width: usize,
        /// Height in pixels.
        height: usize,
        /// Bytes per pixel.
        channels: usize,
    },
}

/// Payload encoding, derived from the channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB.
    Rgb24,
    /// 16-bit little-endian depth, millimeters.
    Depth16,
}

impl PixelFormat {
    /// Format for a producer's `channels` value.
    pub fn from_channels(channels: usize) -> Result<Self, FrameError> {
        match channels {
            3 => Ok(Self::Rgb24),
            2 => Ok(Self::Depth16),
            other => Err(FrameError::UnsupportedChannels(other)),
        }
    }

    /// Bytes per pixel on the wire.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Depth16 => 2,
        }
    }
}

fn expected_len(width: usize, height: usize, channels: usize) -> Result<usize, FrameError> {
    width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(channels))
        .filter(|&len| len > 0)
        .ok_or(FrameError::InvalidShape {
            width,
            height,
            channels,
        })
}

fn check_len(buffer: &[u8], expected: usize) -> Result<(), FrameError> {
    if buffer.len() == expected {
        Ok(())
    } else {
        Err(FrameError::LengthMismatch {
            expected,
            actual: buffer.len(),
        })
    }
}

/// Validate an RGB payload and hand it back unchanged.
pub fn rgb_from_raw(buffer: &[u8], width: usize, height: usize) -> Result<&[u8], FrameError> {
    check_len(buffer, expected_len(width, height, 3)?)?;
    Ok(buffer)
}

/// Display intensity of one depth sample.
pub fn depth_intensity(sample_mm: u16) -> u8 {
    let clamped = f32::from(sample_mm.min(DEPTH_DISPLAY_MAX_MM));
    (clamped / f32::from(DEPTH_DISPLAY_MAX_MM) * 255.0).round() as u8
}

fn depth_samples(buffer: &[u8]) -> impl Iterator<Item = u16> + '_ {
    buffer
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

/// Convert 16-bit depth to a grey RGB24 image.
pub fn depth16_to_intensity(
    buffer: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<u8>, FrameError> {
    let mut out = vec![0; expected_len(width, height, DISPLAY_CHANNELS)?];
    depth16_to_intensity_into(buffer, width, height, &mut out)?;
    Ok(out)
}

/// In-place variant of [`depth16_to_intensity`]; `out` must already be
/// `width * height * 3` bytes.
pub fn depth16_to_intensity_into(
    buffer: &[u8],
    width: usize,
    height: usize,
    out: &mut [u8],
) -> Result<(), FrameError> {
    check_len(buffer, expected_len(width, height, 2)?)?;
    check_len(out, expected_len(width, height, DISPLAY_CHANNELS)?)?;
    for (sample, px) in depth_samples(buffer).zip(out.chunks_exact_mut(DISPLAY_CHANNELS)) {
        px.fill(depth_intensity(sample));
    }
    Ok(())
}

/// Convert 16-bit depth to meters, reusing `out`'s allocation.
pub fn depth16_to_meters_into(
    buffer: &[u8],
    width: usize,
    height: usize,
    out: &mut Vec<f32>,
) -> Result<(), FrameError> {
    check_len(buffer, expected_len(width, height, 2)?)?;
    out.clear();
    out.extend(depth_samples(buffer).map(|mm| f32::from(mm) / 1000.0));
    Ok(())
}

/// Display buffer owned by one session, reused across frames.
///
/// `data` is RGB24 regardless of the incoming format. The allocation is kept
/// while width, height, and channel count stay the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    channels: usize,
    pixel_format: String,
    data: Vec<u8>,
    allocations: usize,
}

impl FrameBuffer {
    /// Allocate a black buffer for the given incoming shape.
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        pixel_format: impl Into<String>,
    ) -> Result<Self, FrameError> {
        PixelFormat::from_channels(channels)?;
        let len = expected_len(width, height, DISPLAY_CHANNELS)?;
        Ok(Self {
            width,
            height,
            channels,
            pixel_format: pixel_format.into(),
            data: vec![0; len],
            allocations: 1,
        })
    }

    /// Adopt a new incoming shape. Reallocates only when the dimensions or
    /// channel count change; returns whether it did.
    pub fn ensure_shape(
        &mut self,
        width: usize,
        height: usize,
        channels: usize,
        pixel_format: &str,
    ) -> Result<bool, FrameError> {
        if pixel_format != self.pixel_format {
            self.pixel_format = pixel_format.to_string();
        }
        if (width, height, channels) == (self.width, self.height, self.channels) {
            return Ok(false);
        }
        PixelFormat::from_channels(channels)?;
        let len = expected_len(width, height, DISPLAY_CHANNELS)?;
        self.data = vec![0; len];
        self.width = width;
        self.height = height;
        self.channels = channels;
        self.allocations += 1;
        Ok(true)
    }

    /// Decode a raw payload into the buffer. On error the previous contents
    /// are untouched.
    pub fn apply_raw(&mut self, raw: &[u8]) -> Result<(), FrameError> {
        match PixelFormat::from_channels(self.channels)? {
            PixelFormat::Rgb24 => {
                let rgb = rgb_from_raw(raw, self.width, self.height)?;
                self.data.copy_from_slice(rgb);
                Ok(())
            }
            PixelFormat::Depth16 => {
                depth16_to_intensity_into(raw, self.width, self.height, &mut self.data)
            }
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Incoming bytes per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Producer's pixel format tag.
    pub fn pixel_format(&self) -> &str {
        &self.pixel_format
    }

    /// Incoming payload encoding.
    pub fn format(&self) -> Result<PixelFormat, FrameError> {
        PixelFormat::from_channels(self.channels)
    }

    /// RGB24 display bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable display bytes (for overlays).
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Number of times the pixel storage was allocated.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

/// Announcement a producer may push on a notify-mode image channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameNotice {
    /// Producer's running frame counter.
    #[serde(rename = "imageCount")]
    pub image_count: i64,
}

impl FrameNotice {
    /// Parse `{"imageCount": n, ...}`; other fields are ignored.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_endpoints_and_clamp() {
        assert_eq!(depth_intensity(0), 0);
        assert_eq!(depth_intensity(1000), 128);
        assert_eq!(depth_intensity(2000), 255);
        assert_eq!(depth_intensity(u16::MAX), 255);
    }

    #[test]
    fn depth_samples_are_little_endian() {
        // 0x03e8 = 1000 mm
        let out = depth16_to_intensity(&[0xe8, 0x03, 0x00, 0x00], 2, 1).unwrap();
        assert_eq!(out, vec![128, 128, 128, 0, 0, 0]);
    }

    #[test]
    fn rgb_length_must_match_shape() {
        assert!(rgb_from_raw(&[0; 12], 2, 2).is_ok());
        assert_eq!(
            rgb_from_raw(&[0; 11], 2, 2),
            Err(FrameError::LengthMismatch {
                expected: 12,
                actual: 11
            })
        );
    }

    #[test]
    fn corrupt_frame_keeps_previous_image() {
        let mut fb = FrameBuffer::new(2, 1, 3, "RGB").unwrap();
        fb.apply_raw(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert!(fb.apply_raw(&[9; 5]).is_err());
        assert_eq!(fb.data(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn buffer_reallocates_only_on_shape_change() {
        let mut fb = FrameBuffer::new(4, 4, 3, "RGB").unwrap();
        assert!(!fb.ensure_shape(4, 4, 3, "RGB").unwrap());
        assert_eq!(fb.allocations(), 1);
        assert!(fb.ensure_shape(8, 4, 2, "GRAY16").unwrap());
        assert_eq!(fb.allocations(), 2);
        assert_eq!(fb.data().len(), 8 * 4 * 3);
        assert_eq!(fb.format().unwrap(), PixelFormat::Depth16);
    }

    #[test]
    fn rejects_unknown_channels_and_empty_shapes() {
        assert_eq!(
            FrameBuffer::new(2, 2, 4, "RGBA").unwrap_err(),
            FrameError::UnsupportedChannels(4)
        );
        assert!(matches!(
            FrameBuffer::new(0, 2, 3, "RGB"),
            Err(FrameError::InvalidShape { .. })
        ));
    }

    #[test]
    fn meters_reuse_output_vector() {
        let mut out = Vec::with_capacity(8);
        depth16_to_meters_into(&[0xd0, 0x07, 0xf4, 0x01], 2, 1, &mut out).unwrap();
        assert_eq!(out, vec![2.0, 0.5]);
    }

    #[test]
    fn frame_notice_reads_image_count() {
        let notice = FrameNotice::from_json(br#"{"imageCount":12,"width":640}"#).unwrap();
        assert_eq!(notice.image_count, 12);
        assert!(FrameNotice::from_json(b"1").is_err());
    }
}
