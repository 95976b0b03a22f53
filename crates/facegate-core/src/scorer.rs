//! Pairwise similarity scoring via ONNX Runtime.
//!
//! Wraps a pretrained siamese model: two embedding towers joined by an
//! absolute-difference combinator and a sigmoid head, producing one bounded
//! similarity score per image pair. The learned weights are an external
//! artifact loaded once at process start.

use crate::preprocess::{ImageTensor, TARGET_CHANNELS, TARGET_SIZE};
use ndarray::Axis;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SIAMESE_INPUT_COUNT: usize = 2;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model file not found: {0} — place the exported siamese ONNX artifact there")]
    NotFound(String),
    #[error("incompatible model: {0}")]
    Incompatible(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("tensor shape mismatch: expected [{expected_size}, {expected_size}, {expected_channels}], got {actual:?}")]
    ShapeMismatch {
        expected_size: usize,
        expected_channels: usize,
        actual: Vec<usize>,
    },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Strategy for scoring one preprocessed image pair.
///
/// Identical input tensors always yield the identical score; no state is
/// carried between calls.
pub trait PairScorer {
    fn score(&mut self, probe: &ImageTensor, reference: &ImageTensor)
        -> Result<f32, ScoringError>;
}

/// Siamese similarity scorer backed by an ONNX session.
pub struct SiameseScorer {
    session: Session,
}

impl SiameseScorer {
    /// Load the siamese ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ModelLoadError> {
        if !Path::new(model_path).exists() {
            return Err(ModelLoadError::NotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let input_count = session.inputs().len();
        if input_count != SIAMESE_INPUT_COUNT {
            return Err(ModelLoadError::Incompatible(format!(
                "expected {SIAMESE_INPUT_COUNT} inputs (probe, reference), model has {input_count}"
            )));
        }

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded siamese model"
        );

        Ok(Self { session })
    }

    fn check_shape(tensor: &ImageTensor) -> Result<(), ScoringError> {
        let expected = [TARGET_SIZE as usize, TARGET_SIZE as usize, TARGET_CHANNELS];
        if tensor.shape() != expected {
            return Err(ScoringError::ShapeMismatch {
                expected_size: TARGET_SIZE as usize,
                expected_channels: TARGET_CHANNELS,
                actual: tensor.shape().to_vec(),
            });
        }
        Ok(())
    }
}

impl PairScorer for SiameseScorer {
    /// Score one preprocessed pair. Returns the sigmoid head's output,
    /// clamped to [0, 1].
    fn score(
        &mut self,
        probe: &ImageTensor,
        reference: &ImageTensor,
    ) -> Result<f32, ScoringError> {
        Self::check_shape(probe)?;
        Self::check_shape(reference)?;

        let probe_batch = probe.view().insert_axis(Axis(0));
        let reference_batch = reference.view().insert_axis(Axis(0));

        let outputs = self.session.run(ort::inputs![
            TensorRef::from_array_view(probe_batch)?,
            TensorRef::from_array_view(reference_batch)?
        ])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ScoringError::InferenceFailed(format!("similarity head: {e}")))?;

        let Some(&value) = raw.first() else {
            return Err(ScoringError::InferenceFailed(
                "similarity head produced no output".into(),
            ));
        };

        Ok(value.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_check_shape_accepts_model_input() {
        let tensor = Array3::<f32>::zeros((100, 100, 3));
        assert!(SiameseScorer::check_shape(&tensor).is_ok());
    }

    #[test]
    fn test_check_shape_rejects_wrong_size() {
        let tensor = Array3::<f32>::zeros((112, 112, 3));
        let err = SiameseScorer::check_shape(&tensor).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::ShapeMismatch { ref actual, .. } if actual == &vec![112, 112, 3]
        ));
    }

    #[test]
    fn test_check_shape_rejects_wrong_channels() {
        let tensor = Array3::<f32>::zeros((100, 100, 1));
        assert!(SiameseScorer::check_shape(&tensor).is_err());
    }

    #[test]
    fn test_load_missing_artifact() {
        let result = SiameseScorer::load("/nonexistent/siamese_l1.onnx");
        assert!(matches!(result, Err(ModelLoadError::NotFound(_))));
    }
}
