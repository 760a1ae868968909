use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedItem {
    pub item: String,
    /// Raw scorer output scaled to a percentage (0-100)
    pub probability: f64,
}

/// Result of one prediction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub basket: Vec<String>,
    pub predicted_items: Vec<PredictedItem>,
    /// Basket names the model does not know; advisory only
    pub unknown_items: Vec<String>,
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleState {
    Unloaded,
    Loading,
    Ready,
    Failed,
    /// Installed bundle was taken out of service by a scorer fault
    Disabled,
}

impl BundleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleState::Unloaded => "unloaded",
            BundleState::Loading => "loading",
            BundleState::Ready => "ready",
            BundleState::Failed => "failed",
            BundleState::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub version: String,
    pub item_count: usize,
    pub scorer: &'static str,
    pub loaded_at: DateTime<Utc>,
    /// `metrics.json` written by the training job, if present
    pub training_metrics: Option<serde_json::Value>,
    pub usable: bool,
}

/// Health view of the artifact store
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    /// Outcome of the most recent load attempt, or `disabled` once the
    /// serving bundle has faulted
    pub state: BundleState,
    /// Version answering requests right now, if any
    pub serving_version: Option<String>,
    pub last_error: Option<String>,
}
