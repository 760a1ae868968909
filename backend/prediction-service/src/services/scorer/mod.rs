/// Scorer Module
///
/// The trained model behind a single capability: encoded basket in, one
/// purchase likelihood per vocabulary item out.
///
/// # Implementations
/// - **DenseScorer**: feed-forward weights evaluated with ndarray
/// - **OnnxScorer**: exported ONNX graph run with tract-onnx
///
/// Outputs are never trusted: [`validate_scores`] checks width and range on
/// every call before anything reaches the ranker.
pub mod dense;
pub mod onnx;

pub use dense::{Activation, DenseLayer, DenseLayerSpec, DenseScorer, DenseScorerSpec};
pub use onnx::OnnxScorer;

use crate::error::ScoringError;
use ndarray::Array1;

pub trait Scorer: Send + Sync {
    /// Short label for logs and model info (`dense`, `onnx`, ...)
    fn kind(&self) -> &'static str;

    fn input_width(&self) -> usize;

    fn output_width(&self) -> usize;

    fn score(&self, input: &Array1<f32>) -> Result<Array1<f32>, ScoringError>;
}

/// Reject a score vector of the wrong length or with values outside `[0, 1]`.
pub fn validate_scores(scores: &Array1<f32>, expected: usize) -> Result<(), ScoringError> {
    if scores.len() != expected {
        return Err(ScoringError::WidthMismatch {
            expected,
            actual: scores.len(),
        });
    }

    for (index, value) in scores.iter().enumerate() {
        if !value.is_finite() || *value < 0.0 || *value > 1.0 {
            return Err(ScoringError::InvalidValue {
                index,
                value: *value,
            });
        }
    }

    Ok(())
}
