//! Verdict aggregation.
//!
//! Combines one probe's pair scores against every gallery image into a
//! single verified/unverified decision using two thresholds: a per-pair
//! detection cutoff (tuned high, so one strong match means one detection)
//! and a cycle-level verification cutoff on the fraction of detections.
//! A single noisy or stale gallery image cannot flip the decision.

use crate::preprocess::{self, ImageTensor, PreprocessError};
use crate::scorer::{PairScorer, ScoringError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Per-pair similarity cutoff; scores strictly above it count as detections.
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.99;
/// Cycle-level cutoff on the detection fraction required to verify.
pub const DEFAULT_VERIFICATION_THRESHOLD: f32 = 0.8;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("gallery is empty — no reference images to compare against")]
    EmptyGallery,
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// Detection and verification cutoffs for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub detection: f32,
    pub verification: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            detection: DEFAULT_DETECTION_THRESHOLD,
            verification: DEFAULT_VERIFICATION_THRESHOLD,
        }
    }
}

/// Similarity of one probe/gallery pair, in [0, 1].
#[derive(Debug, Clone)]
pub struct PairScore {
    pub value: f32,
    /// Gallery image the score was computed against.
    pub reference: PathBuf,
}

/// Outcome of one verification cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub detection_count: usize,
    pub gallery_size: usize,
    pub verification_ratio: f32,
    pub verified: bool,
}

/// Tally pair scores into a verification result.
///
/// `detection_count` counts scores strictly greater than the detection
/// threshold; `verified` requires the detection fraction to strictly exceed
/// the verification threshold. Fails before dividing when no scores exist.
pub fn tally(scores: &[PairScore], thresholds: &Thresholds) -> Result<VerificationResult, AggregateError> {
    if scores.is_empty() {
        return Err(AggregateError::EmptyGallery);
    }

    let detection_count = scores
        .iter()
        .filter(|score| score.value > thresholds.detection)
        .count();
    let gallery_size = scores.len();
    let verification_ratio = detection_count as f32 / gallery_size as f32;
    let verified = verification_ratio > thresholds.verification;

    Ok(VerificationResult {
        detection_count,
        gallery_size,
        verification_ratio,
        verified,
    })
}

/// Score one preprocessed probe against every gallery image and tally.
///
/// The probe tensor is computed once per cycle by the caller and reused for
/// every comparison; only the gallery images are preprocessed here, one per
/// scoring call. The gallery must be non-empty — checked before any
/// preprocessing or scoring work is done.
pub fn verify_probe<S: PairScorer>(
    scorer: &mut S,
    probe: &ImageTensor,
    gallery: &[PathBuf],
    thresholds: &Thresholds,
) -> Result<VerificationResult, AggregateError> {
    if gallery.is_empty() {
        return Err(AggregateError::EmptyGallery);
    }

    let mut scores = Vec::with_capacity(gallery.len());
    for reference_path in gallery {
        let reference = preprocess::from_file(reference_path)?;
        let value = scorer.score(probe, &reference)?;
        tracing::debug!(
            reference = %reference_path.display(),
            score = value,
            "gallery comparison"
        );
        scores.push(PairScore {
            value,
            reference: reference_path.clone(),
        });
    }

    tally(&scores, thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn pair_scores(values: &[f32]) -> Vec<PairScore> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| PairScore {
                value,
                reference: PathBuf::from(format!("ref_{i}.jpg")),
            })
            .collect()
    }

    struct FixedScorer {
        scores: Vec<f32>,
        calls: usize,
    }

    impl FixedScorer {
        fn new(scores: &[f32]) -> Self {
            Self {
                scores: scores.to_vec(),
                calls: 0,
            }
        }
    }

    impl PairScorer for FixedScorer {
        fn score(
            &mut self,
            _probe: &ImageTensor,
            _reference: &ImageTensor,
        ) -> Result<f32, ScoringError> {
            let value = self.scores[self.calls % self.scores.len()];
            self.calls += 1;
            Ok(value)
        }
    }

    fn temp_gallery(name: &str, count: usize) -> (PathBuf, Vec<PathBuf>) {
        let dir = std::env::temp_dir().join(format!("facegate_verdict_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();

        let mut paths = Vec::new();
        for i in 0..count {
            let path = dir.join(format!("ref_{i}.png"));
            RgbImage::from_pixel(8, 8, image::Rgb([i as u8 * 40, 80, 120]))
                .save(&path)
                .unwrap();
            paths.push(path);
        }
        (dir, paths)
    }

    #[test]
    fn test_three_strong_matches_of_five_is_unverified() {
        let scores = pair_scores(&[0.995, 0.991, 0.50, 0.999, 0.20]);
        let result = tally(&scores, &Thresholds::default()).unwrap();
        assert_eq!(result.detection_count, 3);
        assert_eq!(result.gallery_size, 5);
        assert!((result.verification_ratio - 0.6).abs() < 1e-6);
        assert!(!result.verified);
    }

    #[test]
    fn test_unanimous_gallery_is_verified() {
        let scores = pair_scores(&[0.999, 0.999, 0.999]);
        let result = tally(&scores, &Thresholds::default()).unwrap();
        assert_eq!(result.detection_count, 3);
        assert!((result.verification_ratio - 1.0).abs() < 1e-6);
        assert!(result.verified);
    }

    #[test]
    fn test_ratio_equal_to_threshold_is_unverified() {
        // 4 of 5 detections: ratio exactly 0.8, strict comparison fails
        let scores = pair_scores(&[0.999, 0.999, 0.999, 0.999, 0.1]);
        let result = tally(&scores, &Thresholds::default()).unwrap();
        assert_eq!(result.detection_count, 4);
        assert_eq!(result.verification_ratio, 0.8);
        assert!(!result.verified);
    }

    #[test]
    fn test_score_equal_to_detection_threshold_is_not_a_detection() {
        let scores = pair_scores(&[0.99]);
        let result = tally(&scores, &Thresholds::default()).unwrap();
        assert_eq!(result.detection_count, 0);
    }

    #[test]
    fn test_empty_scores_fail_cleanly() {
        let result = tally(&[], &Thresholds::default());
        assert!(matches!(result, Err(AggregateError::EmptyGallery)));
    }

    #[test]
    fn test_verify_probe_scores_each_gallery_image_once() {
        let (dir, paths) = temp_gallery("each_once", 4);
        let mut scorer = FixedScorer::new(&[0.999]);
        let probe = ImageTensor::zeros((100, 100, 3));

        let result = verify_probe(&mut scorer, &probe, &paths, &Thresholds::default()).unwrap();
        assert_eq!(scorer.calls, 4);
        assert_eq!(result.gallery_size, 4);
        assert!(result.verified);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_verify_probe_mixed_scores() {
        let (dir, paths) = temp_gallery("mixed", 5);
        let mut scorer = FixedScorer::new(&[0.995, 0.991, 0.50, 0.999, 0.20]);
        let probe = ImageTensor::zeros((100, 100, 3));

        let result = verify_probe(&mut scorer, &probe, &paths, &Thresholds::default()).unwrap();
        assert_eq!(result.detection_count, 3);
        assert!(!result.verified);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_verify_probe_empty_gallery_never_invokes_scorer() {
        let mut scorer = FixedScorer::new(&[0.999]);
        let probe = ImageTensor::zeros((100, 100, 3));

        let result = verify_probe(&mut scorer, &probe, &[], &Thresholds::default());
        assert!(matches!(result, Err(AggregateError::EmptyGallery)));
        assert_eq!(scorer.calls, 0);
    }

    #[test]
    fn test_verify_probe_unreadable_reference_aborts() {
        let paths = vec![PathBuf::from("/nonexistent/ref.png")];
        let mut scorer = FixedScorer::new(&[0.999]);
        let probe = ImageTensor::zeros((100, 100, 3));

        let result = verify_probe(&mut scorer, &probe, &paths, &Thresholds::default());
        assert!(matches!(result, Err(AggregateError::Preprocess(_))));
        assert_eq!(scorer.calls, 0);
    }
}
