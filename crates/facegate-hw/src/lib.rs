//! facegate-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based color camera access and frame handling (YUYV→RGB
//! conversion, probe-region cropping).

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::{CropRegion, Frame, FrameError};
