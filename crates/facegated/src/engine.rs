//! Verification engine — owns the camera and the scoring model.
//!
//! A dedicated OS thread executes cycles one at a time: scoped camera
//! acquisition, probe crop and slot overwrite, fresh gallery scan, one
//! probe preprocessing shared across every comparison, per-pair scoring,
//! tally, notification. The trigger gateway guarantees requests arrive at
//! most one at a time; this thread guarantees the camera and model are
//! never used concurrently by two cycles.

use crate::config::Config;
use crate::gateway::{CycleStage, CycleState, TriggerOrigin};
use crate::notifier::{Notifier, NotifierConfig};
use chrono::{DateTime, Utc};
use facegate_core::preprocess::{self, PreprocessError};
use facegate_core::scorer::ModelLoadError;
use facegate_core::verdict::{self, AggregateError, Thresholds, VerificationResult};
use facegate_core::gallery::{self, GalleryError};
use facegate_core::SiameseScorer;
use facegate_hw::{Camera, CameraError, CropRegion, Frame, FrameError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Startup failures. Both are fatal: the daemon cannot verify without a
/// camera and a loaded model.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("model load error: {0}")]
    Model(#[from] ModelLoadError),
}

/// Failures local to one verification cycle. Caught at the engine loop;
/// the gateway returns to idle and the next trigger starts clean.
#[derive(Error, Debug)]
enum CycleError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("probe slot write failed: {0}")]
    ProbeSlot(String),
    #[error("gallery error: {0}")]
    Gallery(#[from] GalleryError),
    #[error("preprocess error: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("aggregation error: {0}")]
    Verdict(#[from] AggregateError),
}

/// What the outcome display shows. Published over a watch channel; updated
/// only when a cycle runs to completion, so an aborted cycle leaves the
/// previous state visible.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayState {
    pub label: &'static str,
    pub last_result: Option<VerificationResult>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            label: "Verification Uninitiated",
            last_result: None,
            completed_at: None,
        }
    }
}

impl DisplayState {
    fn completed(result: &VerificationResult) -> Self {
        Self {
            label: if result.verified { "Verified" } else { "Unverified" },
            last_result: Some(result.clone()),
            completed_at: Some(Utc::now()),
        }
    }
}

/// One admitted verification request.
pub struct VerifyRequest {
    pub origin: TriggerOrigin,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) tx: mpsc::Sender<VerifyRequest>,
}

impl EngineHandle {
    /// Hand an admitted request to the engine thread, non-blocking.
    pub fn submit(
        &self,
        origin: TriggerOrigin,
    ) -> Result<(), mpsc::error::TrySendError<VerifyRequest>> {
        self.tx.try_send(VerifyRequest { origin })
    }
}

/// Engine resources shared with the rest of the daemon.
pub struct Engine {
    pub handle: EngineHandle,
    /// Camera shared with the preview loop; locked only for single captures.
    pub camera: Arc<Mutex<Camera>>,
    pub state: Arc<CycleState>,
}

/// Cycle parameters fixed at startup.
struct CycleSettings {
    gallery_dir: PathBuf,
    probe_path: PathBuf,
    probe_crop: CropRegion,
    thresholds: Thresholds,
}

/// Spawn the engine on a dedicated OS thread.
///
/// Opens the camera and loads the similarity model synchronously, failing
/// fast if either is unavailable, then enters the request loop.
pub fn spawn_engine(
    config: &Config,
    display: watch::Sender<DisplayState>,
) -> Result<Engine, EngineError> {
    let camera = Camera::open(&config.camera_device)?;
    tracing::info!(
        device = %config.camera_device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera opened"
    );

    let mut scorer = SiameseScorer::load(&config.model_path.to_string_lossy())?;
    tracing::info!(path = %config.model_path.display(), "similarity model loaded");

    let camera = Arc::new(Mutex::new(camera));
    let state = Arc::new(CycleState::new());

    let settings = CycleSettings {
        gallery_dir: config.gallery_dir.clone(),
        probe_path: config.probe_path.clone(),
        probe_crop: config.probe_crop,
        thresholds: config.thresholds,
    };
    let notifier_config = NotifierConfig {
        verified_url: config.verified_url.clone(),
        unverified_url: config.unverified_url.clone(),
        timeout: Duration::from_secs(config.notify_timeout_secs),
    };

    let (tx, mut rx) = mpsc::channel::<VerifyRequest>(1);
    let thread_camera = camera.clone();
    let thread_state = state.clone();

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            let notifier = Notifier::new(notifier_config);
            tracing::info!("engine thread started");
            while let Some(request) = rx.blocking_recv() {
                tracing::info!(origin = request.origin.as_str(), "verification cycle started");
                match run_cycle(&thread_camera, &mut scorer, &notifier, &settings, &thread_state) {
                    Ok(result) => {
                        tracing::info!(
                            detection_count = result.detection_count,
                            gallery_size = result.gallery_size,
                            verification_ratio = result.verification_ratio,
                            verified = result.verified,
                            "verification cycle complete"
                        );
                        let _ = display.send(DisplayState::completed(&result));
                    }
                    Err(e) => {
                        tracing::error!(
                            stage = thread_state.current().as_str(),
                            error = %e,
                            "verification cycle failed"
                        );
                    }
                }
                thread_state.finish();
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(Engine {
        handle: EngineHandle { tx },
        camera,
        state,
    })
}

/// Run one full cycle: capture → score → notify.
///
/// The camera lock covers only the frame grab, so the preview loop resumes
/// while scoring runs. The probe tensor is computed once and reused for
/// every gallery comparison.
fn run_cycle(
    camera: &Arc<Mutex<Camera>>,
    scorer: &mut SiameseScorer,
    notifier: &Notifier,
    settings: &CycleSettings,
    state: &CycleState,
) -> Result<VerificationResult, CycleError> {
    let frame = {
        let cam = camera.lock().expect("camera mutex poisoned");
        cam.capture_frame()?
    };

    let probe = frame.crop(settings.probe_crop)?;
    store_probe(&probe, &settings.probe_path)?;
    tracing::debug!(
        sequence = probe.sequence,
        slot = %settings.probe_path.display(),
        "probe captured"
    );

    state.advance(CycleStage::Scoring);
    let references = gallery::scan(&settings.gallery_dir)?;
    let probe_tensor = preprocess::from_rgb(&probe.data, probe.width, probe.height)?;
    let result = verdict::verify_probe(scorer, &probe_tensor, &references, &settings.thresholds)?;

    state.advance(CycleStage::Notifying);
    notifier.notify(result.verified);

    Ok(result)
}

/// Overwrite the fixed probe slot with the captured frame.
fn store_probe(frame: &Frame, path: &Path) -> Result<(), CycleError> {
    let image = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| {
            CycleError::ProbeSlot(format!(
                "frame buffer is not {}x{} RGB",
                frame.width, frame.height
            ))
        })?;
    image
        .save(path)
        .map_err(|e| CycleError::ProbeSlot(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(verified: bool) -> VerificationResult {
        VerificationResult {
            detection_count: 3,
            gallery_size: 3,
            verification_ratio: 1.0,
            verified,
        }
    }

    #[test]
    fn test_display_state_initial_label() {
        assert_eq!(DisplayState::default().label, "Verification Uninitiated");
    }

    #[test]
    fn test_display_state_labels_follow_verdict() {
        assert_eq!(DisplayState::completed(&result(true)).label, "Verified");
        assert_eq!(DisplayState::completed(&result(false)).label, "Unverified");
    }

    #[test]
    fn test_store_probe_overwrites_slot() {
        let path = std::env::temp_dir().join("facegate_probe_slot.png");
        let frame = Frame {
            data: vec![200u8; 4 * 4 * 3],
            width: 4,
            height: 4,
            timestamp: std::time::Instant::now(),
            sequence: 1,
        };
        store_probe(&frame, &path).unwrap();

        let second = Frame {
            data: vec![10u8; 4 * 4 * 3],
            width: 4,
            height: 4,
            timestamp: std::time::Instant::now(),
            sequence: 2,
        };
        store_probe(&second, &path).unwrap();

        let stored = image::open(&path).unwrap().to_rgb8();
        std::fs::remove_file(&path).ok();
        assert_eq!(stored.get_pixel(0, 0)[0], 10);
    }
}
