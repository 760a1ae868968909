//! Prediction Service - next-item recommendations for a partial basket
//!
//! This service provides:
//! - Versioned model bundles (vocabulary, encoder state, scorer) with
//!   load-time validation and atomic publish
//! - Multi-hot basket encoding with unknown-item advisories
//! - Deterministic top-K ranking that excludes basket items
//! - Dense (ndarray) and ONNX (tract) scorers behind one trait

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{ArtifactError, ErrorClass, PredictionError, ScoringError};
pub use models::{BundleState, ModelInfo, PredictedItem, Prediction, StoreStatus};
pub use services::{
    ArtifactBundle, ArtifactStore, BasketEncoder, PredictionService, Ranker, Scorer, Vocabulary,
};
