//! Image preprocessing for the siamese similarity model.
//!
//! Both probe and gallery images are normalized to a 100x100x3 float tensor
//! in [0, 1] before scoring. File and in-memory sources funnel through the
//! same resize/normalize routine, so identical source pixels produce
//! bit-identical tensors regardless of origin.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array3;
use std::path::Path;
use thiserror::Error;

/// Edge length of the model input, in pixels.
pub const TARGET_SIZE: u32 = 100;
/// Channels of the model input (RGB).
pub const TARGET_CHANNELS: usize = 3;

/// A preprocessed image: shape (100, 100, 3), values in [0, 1], RGB order.
pub type ImageTensor = Array3<f32>;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("image file not found: {0}")]
    FileNotFound(String),
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        source: image::ImageError,
    },
    #[error("pixel buffer length mismatch: expected {expected} bytes for {width}x{height} RGB, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Preprocess an image file into a model input tensor.
///
/// Decodes via the `image` crate and converts to RGB, so channel order
/// matches [`from_rgb`] exactly.
pub fn from_file(path: &Path) -> Result<ImageTensor, PreprocessError> {
    if !path.exists() {
        return Err(PreprocessError::FileNotFound(
            path.to_string_lossy().into_owned(),
        ));
    }

    let img = image::open(path).map_err(|source| PreprocessError::Decode {
        path: path.to_string_lossy().into_owned(),
        source,
    })?;

    Ok(tensor_from_rgb(&img.to_rgb8()))
}

/// Preprocess an in-memory RGB pixel buffer (`width * height * 3` bytes,
/// row-major) into a model input tensor.
pub fn from_rgb(data: &[u8], width: u32, height: u32) -> Result<ImageTensor, PreprocessError> {
    let expected = (width as usize) * (height as usize) * TARGET_CHANNELS;
    if data.len() != expected {
        return Err(PreprocessError::BufferSize {
            width,
            height,
            expected,
            actual: data.len(),
        });
    }

    let img = RgbImage::from_raw(width, height, data.to_vec()).ok_or(
        PreprocessError::BufferSize {
            width,
            height,
            expected,
            actual: data.len(),
        },
    )?;

    Ok(tensor_from_rgb(&img))
}

/// Bilinear resize to 100x100, then scale 0–255 channel values into [0, 1].
fn tensor_from_rgb(img: &RgbImage) -> ImageTensor {
    let resized = image::imageops::resize(img, TARGET_SIZE, TARGET_SIZE, FilterType::Triangle);

    Array3::from_shape_fn(
        (TARGET_SIZE as usize, TARGET_SIZE as usize, TARGET_CHANNELS),
        |(y, x, c)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        data
    }

    #[test]
    fn test_output_shape() {
        let data = solid_rgb(64, 48, [10, 20, 30]);
        let tensor = from_rgb(&data, 64, 48).unwrap();
        assert_eq!(tensor.shape(), &[100, 100, 3]);
    }

    #[test]
    fn test_normalization_range() {
        let data = solid_rgb(32, 32, [255, 0, 128]);
        let tensor = from_rgb(&data, 32, 32).unwrap();
        for &v in tensor.iter() {
            assert!((0.0..=1.0).contains(&v), "value {v} outside [0, 1]");
        }
        // Bilinear resize of a solid image is still solid
        assert!((tensor[[50, 50, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[50, 50, 1]].abs() < 1e-6);
        assert!((tensor[[50, 50, 2]] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic() {
        let data: Vec<u8> = (0..200 * 150 * 3).map(|i| (i % 251) as u8).collect();
        let a = from_rgb(&data, 200, 150).unwrap();
        let b = from_rgb(&data, 200, 150).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_file_and_buffer_bit_identical() {
        // PNG is lossless, so the decoded file carries the same pixels as
        // the in-memory buffer it was written from.
        let width = 120u32;
        let height = 90u32;
        let data: Vec<u8> = (0..width * height * 3).map(|i| (i % 199) as u8).collect();
        let img = RgbImage::from_raw(width, height, data.clone()).unwrap();

        let path = std::env::temp_dir().join("facegate_preprocess_roundtrip.png");
        img.save(&path).unwrap();

        let from_buffer = from_rgb(&data, width, height).unwrap();
        let from_disk = from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(from_buffer, from_disk);
    }

    #[test]
    fn test_missing_file() {
        let result = from_file(Path::new("/nonexistent/probe.jpg"));
        assert!(matches!(result, Err(PreprocessError::FileNotFound(_))));
    }

    #[test]
    fn test_undecodable_file() {
        let path = std::env::temp_dir().join("facegate_preprocess_garbage.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let result = from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(PreprocessError::Decode { .. })));
    }

    #[test]
    fn test_buffer_length_mismatch() {
        let data = vec![0u8; 100];
        let result = from_rgb(&data, 32, 32);
        assert!(matches!(result, Err(PreprocessError::BufferSize { .. })));
    }
}
