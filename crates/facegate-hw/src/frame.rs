//! Frame type and pixel plumbing — YUYV→RGB conversion and cropping.

use thiserror::Error;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

/// Rectangular region of a frame, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("YUYV width must be even, got {0}")]
    OddWidth(u32),
    #[error("crop region {region:?} exceeds frame bounds {width}x{height}")]
    CropOutOfBounds {
        region: CropRegion,
        width: u32,
        height: u32,
    },
}

impl Frame {
    /// Average channel intensity (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f32).sum::<f32>() / self.data.len() as f32
    }

    /// Copy out a rectangular region as a new frame.
    ///
    /// Timestamp and sequence carry over; the crop is a view of the same
    /// capture, not a new one.
    pub fn crop(&self, region: CropRegion) -> Result<Frame, FrameError> {
        let right = region.x.checked_add(region.width);
        let bottom = region.y.checked_add(region.height);
        let in_bounds = matches!((right, bottom), (Some(r), Some(b)) if r <= self.width && b <= self.height);
        if !in_bounds {
            return Err(FrameError::CropOutOfBounds {
                region,
                width: self.width,
                height: self.height,
            });
        }

        let src_stride = self.width as usize * 3;
        let row_bytes = region.width as usize * 3;
        let mut data = Vec::with_capacity(row_bytes * region.height as usize);

        for row in region.y..region.y + region.height {
            let start = row as usize * src_stride + region.x as usize * 3;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        Ok(Frame {
            data,
            width: region.width,
            height: region.height,
            timestamp: self.timestamp,
            sequence: self.sequence,
        })
    }
}

/// Convert packed YUYV (4:2:2) to interleaved RGB using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share the
/// chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    if width % 2 != 0 {
        return Err(FrameError::OddWidth(width));
    }
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        push_rgb(&mut rgb, y0, u, v);
        push_rgb(&mut rgb, y1, u, v);
    }

    Ok(rgb)
}

fn push_rgb(out: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344136 * u - 0.714136 * v;
    let b = y + 1.772 * u;

    out.push(r.round().clamp(0.0, 255.0) as u8);
    out.push(g.round().clamp(0.0, 255.0) as u8);
    out.push(b.round().clamp(0.0, 255.0) as u8);
}
