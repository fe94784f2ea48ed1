//! Spectrogram image classification.
//!
//! The inference pipeline only sees the [`Classifier`] trait; the production
//! implementation is [`OnnxClassifier`].

mod onnx;

use std::path::Path;

pub use onnx::OnnxClassifier;

use crate::error::Result;
use crate::model::Prediction;

/// Maps a spectrogram image to genre probabilities.
///
/// Implementations are shared between requests, so `predict` takes `&self`.
pub trait Classifier: Send + Sync {
    /// All classes, ordered by descending confidence.
    fn predict(&self, image: &Path) -> Result<Vec<Prediction>>;

    /// The `k` most likely classes.
    fn top(&self, image: &Path, k: usize) -> Result<Vec<Prediction>> {
        let mut predictions = self.predict(image)?;
        predictions.truncate(k);
        Ok(predictions)
    }
}

/// Pair labels with scores and sort by descending confidence.
///
/// Ties keep label order.
pub fn rank(labels: &[String], scores: &[f32]) -> Vec<Prediction> {
    let mut predictions: Vec<Prediction> = labels
        .iter()
        .zip(scores)
        .map(|(label, &score)| Prediction::new(label.clone(), score))
        .collect();
    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    predictions
}

/// Turn raw model scores into a probability distribution.
///
/// Scores that already look like probabilities (non-negative, summing to 1)
/// are returned as-is; anything else goes through a softmax.
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    if scores.iter().all(|&s| s >= 0.0) && (sum - 1.0).abs() <= 1e-3 {
        return scores.to_vec();
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / total).collect()
}
