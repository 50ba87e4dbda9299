//! AI inference layer: text embeddings for duplicate detection and
//! trainable centroid classifiers for category and priority.

pub mod classifier;
pub mod embedder;
#[cfg(feature = "onnx")]
mod onnx;
pub mod similarity;

pub use classifier::{CentroidTrainer, LabeledText, Prediction, TextClassifier, TrainError, Trainer};
pub use embedder::{Embed, HashEmbedder, cosine_sim, normalize};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
pub use similarity::{DuplicateDetector, DuplicateVerdict};
