//! facegate-core — Facial identity verification pipeline.
//!
//! Preprocesses probe and gallery images into fixed-shape tensors, scores
//! image pairs with a pretrained siamese similarity model via ONNX Runtime,
//! and aggregates the pair scores into a verified/unverified decision.

pub mod gallery;
pub mod preprocess;
pub mod scorer;
pub mod verdict;

pub use preprocess::{ImageTensor, PreprocessError};
pub use scorer::{PairScorer, SiameseScorer};
pub use verdict::{PairScore, Thresholds, VerificationResult};

/// Default directory for the similarity model artifact.
pub fn default_model_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("/usr/share/facegate/models")
}
