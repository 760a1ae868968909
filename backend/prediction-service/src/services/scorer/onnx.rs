/// ONNX scorer
///
/// Runs an exported next-item model with tract-onnx. The input is pinned to
/// `[1, N]` at load time, so a graph that cannot accept the vocabulary width
/// fails to optimize and is rejected before it is ever published.
use super::Scorer;
use crate::error::{ArtifactError, ScoringError};
use ndarray::Array1;
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::debug;

/// Type alias for the optimized tract model
type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxScorer {
    model: TractModel,
    input_width: usize,
    output_width: usize,
}

impl OnnxScorer {
    pub fn load(path: &Path, input_width: usize) -> Result<Self, ArtifactError> {
        let invalid =
            |e: TractError| ArtifactError::InvalidScorer(format!("{}: {}", path.display(), e));

        let typed = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(invalid)?
            .with_input_fact(0, f32::fact([1, input_width]).into())
            .map_err(invalid)?
            .into_optimized()
            .map_err(invalid)?;

        let output_width: usize = {
            let fact = typed.output_fact(0).map_err(invalid)?;
            let dims = fact.shape.as_concrete().ok_or_else(|| {
                ArtifactError::InvalidScorer(format!(
                    "{}: output shape is not concrete",
                    path.display()
                ))
            })?;
            dims.iter().product()
        };

        let model = typed.into_runnable().map_err(invalid)?;

        debug!(
            path = %path.display(),
            input_width,
            output_width,
            "Loaded ONNX scorer"
        );

        Ok(Self {
            model,
            input_width,
            output_width,
        })
    }
}

impl Scorer for OnnxScorer {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn input_width(&self) -> usize {
        self.input_width
    }

    fn output_width(&self) -> usize {
        self.output_width
    }

    fn score(&self, input: &Array1<f32>) -> Result<Array1<f32>, ScoringError> {
        if input.len() != self.input_width {
            return Err(ScoringError::Inference(format!(
                "expected {} input features, got {}",
                self.input_width,
                input.len()
            )));
        }

        let data = input.to_vec();
        let tensor = Tensor::from_shape(&[1, self.input_width], &data)
            .map_err(|e| ScoringError::Inference(format!("Failed to build input tensor: {}", e)))?;

        let output = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| ScoringError::Inference(format!("ONNX inference failed: {}", e)))?;

        let scores = output[0]
            .to_array_view::<f32>()
            .map_err(|e| ScoringError::Inference(format!("Output extraction failed: {}", e)))?;

        Ok(Array1::from_iter(scores.iter().copied()))
    }
}
