use facegate_core::verdict::{
    Thresholds, DEFAULT_DETECTION_THRESHOLD, DEFAULT_VERIFICATION_THRESHOLD,
};
use facegate_hw::CropRegion;
use std::path::PathBuf;

const DEFAULT_PROBE_CROP: CropRegion = CropRegion {
    x: 200,
    y: 120,
    width: 250,
    height: 250,
};

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Path to the siamese similarity model artifact.
    pub model_path: PathBuf,
    /// Directory of reference images, enumerated fresh each cycle.
    pub gallery_dir: PathBuf,
    /// Fixed probe slot, overwritten on every capture.
    pub probe_path: PathBuf,
    /// HTTP listen port for the webhook/trigger/status surface.
    pub http_port: u16,
    /// Detection and verification cutoffs.
    pub thresholds: Thresholds,
    /// Endpoint notified on a verified cycle.
    pub verified_url: String,
    /// Endpoint notified on an unverified cycle.
    pub unverified_url: String,
    /// Timeout in seconds for an outbound notification request.
    pub notify_timeout_secs: u64,
    /// Preview refresh interval in milliseconds (~33 Hz by default).
    pub preview_interval_ms: u64,
    /// Region of the captured frame used as the probe.
    pub probe_crop: CropRegion,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACEGATE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facegate_core::default_model_dir());

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facegate");

        let model_path = std::env::var("FACEGATE_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| model_dir.join("siamese_l1.onnx"));

        let gallery_dir = std::env::var("FACEGATE_GALLERY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("gallery"));

        let probe_path = std::env::var("FACEGATE_PROBE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("probe.jpg"));

        Self {
            camera_device: std::env::var("FACEGATE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_path,
            gallery_dir,
            probe_path,
            http_port: env_u16("FACEGATE_HTTP_PORT", 5000),
            thresholds: Thresholds {
                detection: env_f32("FACEGATE_DETECTION_THRESHOLD", DEFAULT_DETECTION_THRESHOLD),
                verification: env_f32(
                    "FACEGATE_VERIFICATION_THRESHOLD",
                    DEFAULT_VERIFICATION_THRESHOLD,
                ),
            },
            verified_url: std::env::var("FACEGATE_VERIFIED_URL").unwrap_or_else(|_| {
                "http://homeassistant.local:8123/api/webhook/facegate_verified".to_string()
            }),
            unverified_url: std::env::var("FACEGATE_UNVERIFIED_URL").unwrap_or_else(|_| {
                "http://homeassistant.local:8123/api/webhook/facegate_unverified".to_string()
            }),
            notify_timeout_secs: env_u64("FACEGATE_NOTIFY_TIMEOUT_SECS", 5),
            preview_interval_ms: env_u64("FACEGATE_PREVIEW_INTERVAL_MS", 30),
            probe_crop: std::env::var("FACEGATE_PROBE_CROP")
                .ok()
                .and_then(|v| parse_crop(&v))
                .unwrap_or(DEFAULT_PROBE_CROP),
        }
    }
}

/// Parse a crop region from "x,y,width,height".
fn parse_crop(value: &str) -> Option<CropRegion> {
    let mut parts = value.split(',').map(|p| p.trim().parse::<u32>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let width = parts.next()?.ok()?;
    let height = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(CropRegion {
        x,
        y,
        width,
        height,
    })
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
