//! Preview loop — the video refresh boundary.
//!
//! Publishes the latest cropped frame over a watch channel at a fixed
//! cadence for whatever renders the live view. Uses `try_lock` on the
//! shared camera: while a verification capture holds the device, ticks are
//! skipped, so a cycle briefly interrupts the preview instead of either
//! side blocking the other.

use facegate_hw::{Camera, CropRegion, Frame};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;
use tokio::sync::watch;

pub fn spawn_preview(
    camera: Arc<Mutex<Camera>>,
    interval: Duration,
    crop: CropRegion,
    tx: watch::Sender<Option<Frame>>,
) {
    std::thread::Builder::new()
        .name("facegate-preview".into())
        .spawn(move || {
            tracing::info!(interval_ms = interval.as_millis() as u64, "preview loop started");
            loop {
                std::thread::sleep(interval);

                let frame = match camera.try_lock() {
                    Ok(cam) => match cam.capture_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(error = %e, "preview capture failed");
                            continue;
                        }
                    },
                    // Camera held by a verification capture; skip this tick
                    Err(TryLockError::WouldBlock) => continue,
                    Err(TryLockError::Poisoned(_)) => {
                        tracing::error!("camera mutex poisoned; preview loop exiting");
                        return;
                    }
                };

                let cropped = match frame.crop(crop) {
                    Ok(cropped) => cropped,
                    Err(e) => {
                        tracing::warn!(error = %e, "preview crop failed");
                        continue;
                    }
                };

                if tx.send(Some(cropped)).is_err() {
                    tracing::info!("preview receivers gone; preview loop exiting");
                    return;
                }
            }
        })
        .expect("failed to spawn preview thread");
}
