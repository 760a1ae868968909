/// Dense feed-forward scorer
///
/// Evaluates the network the training job produces (stacked dense layers,
/// softmax head) from plain JSON weights, without an inference runtime.
use super::Scorer;
use crate::error::{ArtifactError, ScoringError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Softmax,
}

/// One layer as persisted: `weights[out][in]`, `bias[out]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayerSpec {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

/// On-disk form of `scorer.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseScorerSpec {
    pub layers: Vec<DenseLayerSpec>,
}

#[derive(Debug, Clone)]
pub struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    pub fn new(
        weights: Array2<f32>,
        bias: Array1<f32>,
        activation: Activation,
    ) -> Result<Self, ArtifactError> {
        if weights.nrows() != bias.len() {
            return Err(ArtifactError::InvalidScorer(format!(
                "layer has {} output rows but {} bias terms",
                weights.nrows(),
                bias.len()
            )));
        }
        if weights.nrows() == 0 || weights.ncols() == 0 {
            return Err(ArtifactError::InvalidScorer("layer has no weights".into()));
        }
        if weights.iter().chain(bias.iter()).any(|w| !w.is_finite()) {
            return Err(ArtifactError::InvalidScorer(
                "layer contains non-finite weights".into(),
            ));
        }

        Ok(Self {
            weights,
            bias,
            activation,
        })
    }

    fn from_spec(spec: DenseLayerSpec) -> Result<Self, ArtifactError> {
        let rows = spec.weights.len();
        let cols = spec.weights.first().map_or(0, Vec::len);
        if spec.weights.iter().any(|row| row.len() != cols) {
            return Err(ArtifactError::InvalidScorer(
                "weight rows have uneven lengths".into(),
            ));
        }

        let flat: Vec<f32> = spec.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| ArtifactError::InvalidScorer(format!("bad weight shape: {}", e)))?;

        Self::new(weights, Array1::from_vec(spec.bias), spec.activation)
    }

    fn input_width(&self) -> usize {
        self.weights.ncols()
    }

    fn output_width(&self) -> usize {
        self.weights.nrows()
    }

    fn forward(&self, input: &Array1<f32>) -> Array1<f32> {
        let z = self.weights.dot(input) + &self.bias;
        match self.activation {
            Activation::Linear => z,
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Softmax => softmax(z),
        }
    }
}

fn softmax(z: Array1<f32>) -> Array1<f32> {
    let max = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = z.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

#[derive(Debug, Clone)]
pub struct DenseScorer {
    layers: Vec<DenseLayer>,
}

impl DenseScorer {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ArtifactError> {
        if layers.is_empty() {
            return Err(ArtifactError::InvalidScorer("network has no layers".into()));
        }

        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].output_width() != pair[1].input_width() {
                return Err(ArtifactError::InvalidScorer(format!(
                    "layer {} emits {} values but layer {} expects {}",
                    i,
                    pair[0].output_width(),
                    i + 1,
                    pair[1].input_width()
                )));
            }
        }

        Ok(Self { layers })
    }

    pub fn from_spec(spec: DenseScorerSpec) -> Result<Self, ArtifactError> {
        let layers = spec
            .layers
            .into_iter()
            .map(DenseLayer::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(layers)
    }
}

impl Scorer for DenseScorer {
    fn kind(&self) -> &'static str {
        "dense"
    }

    fn input_width(&self) -> usize {
        self.layers[0].input_width()
    }

    fn output_width(&self) -> usize {
        self.layers[self.layers.len() - 1].output_width()
    }

    fn score(&self, input: &Array1<f32>) -> Result<Array1<f32>, ScoringError> {
        if input.len() != self.input_width() {
            return Err(ScoringError::Inference(format!(
                "expected {} input features, got {}",
                self.input_width(),
                input.len()
            )));
        }

        let output = self
            .layers
            .iter()
            .fold(input.clone(), |activations, layer| layer.forward(&activations));

        Ok(output)
    }
}
