/// Prediction Service
///
/// Orchestrates one request against the bundle that is serving when the
/// request starts: encode the basket, score it on the blocking pool under a
/// timeout, rank, and assemble the result with the unknown-item advisory.
///
/// # Failure policy
/// - no bundle, or a bundle disabled by a scorer fault: `ModelUnavailable`
/// - malformed basket or `k == 0`: `InvalidRequest`
/// - scorer error, bad output or timeout: `Scoring` (never retried here)
use super::artifact::{ArtifactBundle, ArtifactStore};
use super::ranker::Ranker;
use super::scorer::validate_scores;
use crate::config::Config;
use crate::error::{PredictionError, Result, ScoringError};
use crate::metrics::PredictionMetrics;
use crate::models::{ModelInfo, Prediction, StoreStatus};
use chrono::Utc;
use ndarray::Array1;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

pub struct PredictionService {
    store: Arc<ArtifactStore>,
    ranker: Ranker,
    top_k: usize,
    scoring_timeout: Duration,
    scoring_permits: Arc<Semaphore>,
}

impl PredictionService {
    pub fn new(store: Arc<ArtifactStore>, config: &Config) -> Self {
        Self {
            store,
            ranker: Ranker::new(),
            top_k: config.top_k,
            scoring_timeout: config.scoring_timeout(),
            scoring_permits: Arc::new(Semaphore::new(config.max_concurrent_scoring)),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Top-K recommendations for `basket` using the configured K.
    pub async fn predict<S: AsRef<str>>(&self, basket: &[S]) -> Result<Prediction> {
        self.predict_top(basket, self.top_k).await
    }

    /// Same as [`predict`](Self::predict) for a basket that has not been
    /// type-checked yet (`["a", "b"]` or `{"items": [...]}`).
    pub async fn predict_json(&self, body: &serde_json::Value) -> Result<Prediction> {
        let basket = match super::encoder::parse_basket(body) {
            Ok(basket) => basket,
            Err(e) => {
                let err = PredictionError::from(e);
                PredictionMetrics::record_request(err.code());
                return Err(err);
            }
        };
        self.predict(basket.as_slice()).await
    }

    pub async fn predict_top<S: AsRef<str>>(&self, basket: &[S], k: usize) -> Result<Prediction> {
        let result = self.run(basket, k).await;
        match &result {
            Ok(_) => PredictionMetrics::record_request("success"),
            Err(e) => PredictionMetrics::record_request(e.code()),
        }
        result
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        self.store
            .current()
            .map(|bundle| bundle.info())
            .ok_or_else(|| self.unavailable())
    }

    pub fn status(&self) -> StoreStatus {
        self.store.status()
    }

    async fn run<S: AsRef<str>>(&self, basket: &[S], k: usize) -> Result<Prediction> {
        if k == 0 {
            return Err(PredictionError::InvalidRequest(
                "k must be a positive integer".to_string(),
            ));
        }

        // Pin one bundle for the whole request
        let bundle = self.ready_bundle()?;
        let basket: Vec<String> = basket.iter().map(|s| s.as_ref().to_string()).collect();

        let encoded = bundle.encoder().encode(basket.as_slice());
        if !encoded.unknown_items.is_empty() {
            warn!(
                version = bundle.version(),
                unknown_items = ?encoded.unknown_items,
                "Unknown items in basket"
            );
            PredictionMetrics::record_unknown_items(encoded.unknown_items.len());
        }

        let scores = match self.score(&bundle, encoded.vector).await {
            Ok(scores) => scores,
            Err(e) => {
                if e.poisons_scorer() {
                    bundle.mark_unusable(e.to_string());
                    error!(
                        version = bundle.version(),
                        error = %e,
                        "Scorer produced unusable output; bundle disabled until reload"
                    );
                } else {
                    warn!(version = bundle.version(), error = %e, "Scoring failed");
                }
                return Err(e.into());
            }
        };

        let predicted_items = self
            .ranker
            .top_k(&scores, basket.as_slice(), bundle.vocabulary(), k)?;

        debug!(
            version = bundle.version(),
            returned = predicted_items.len(),
            "Prediction completed"
        );

        Ok(Prediction {
            basket,
            predicted_items,
            unknown_items: encoded.unknown_items,
            model_version: bundle.version().to_string(),
            timestamp: Utc::now(),
        })
    }

    fn ready_bundle(&self) -> Result<Arc<ArtifactBundle>> {
        let bundle = self.store.current().ok_or_else(|| self.unavailable())?;
        if !bundle.is_usable() {
            return Err(PredictionError::ModelUnavailable(format!(
                "model {} was disabled after a scorer failure; reload required",
                bundle.version()
            )));
        }
        Ok(bundle)
    }

    fn unavailable(&self) -> PredictionError {
        let status = self.store.status();
        let detail = match status.last_error {
            Some(reason) => format!("no model loaded ({}): {}", status.state.as_str(), reason),
            None => format!("no model loaded ({})", status.state.as_str()),
        };
        PredictionError::ModelUnavailable(detail)
    }

    async fn score(
        &self,
        bundle: &ArtifactBundle,
        input: Array1<f32>,
    ) -> std::result::Result<Array1<f32>, ScoringError> {
        // One deadline covers waiting for a slot and the scorer call itself
        let start = Instant::now();
        let deadline = start + self.scoring_timeout;

        // Held by the blocking task: a timed-out call keeps its slot until it returns
        let permit = match tokio::time::timeout_at(
            deadline,
            Arc::clone(&self.scoring_permits).acquire_owned(),
        )
        .await
        {
            Err(_) => return Err(ScoringError::Timeout(self.scoring_timeout)),
            Ok(Err(_)) => {
                return Err(ScoringError::Inference(
                    "scoring pool is closed".to_string(),
                ))
            }
            Ok(Ok(permit)) => permit,
        };

        let scorer = bundle.scorer();
        let width = bundle.vocabulary().len();

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            scorer.score(&input)
        });

        let scores = match tokio::time::timeout_at(deadline, task).await {
            Err(_) => return Err(ScoringError::Timeout(self.scoring_timeout)),
            Ok(Err(join_err)) => {
                return Err(ScoringError::Inference(format!(
                    "scoring task failed: {}",
                    join_err
                )))
            }
            Ok(Ok(result)) => result?,
        };

        PredictionMetrics::record_scoring_duration(start.elapsed().as_secs_f64());

        validate_scores(&scores, width)?;
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::encoder::BasketEncoder;
    use crate::services::scorer::Scorer;
    use crate::services::vocabulary::Vocabulary;
    use mockall::mock;
    use ndarray::array;

    mock! {
        pub TestScorer {}

        impl Scorer for TestScorer {
            fn kind(&self) -> &'static str;
            fn input_width(&self) -> usize;
            fn output_width(&self) -> usize;
            fn score(&self, input: &Array1<f32>) -> std::result::Result<Array1<f32>, ScoringError>;
        }
    }

    fn mock_scorer(width: usize) -> MockTestScorer {
        let mut scorer = MockTestScorer::new();
        scorer.expect_kind().return_const("mock");
        scorer.expect_input_width().return_const(width);
        scorer.expect_output_width().return_const(width);
        scorer
    }

    fn service_with(scorer: MockTestScorer) -> PredictionService {
        let vocab =
            Vocabulary::from_items(["milk", "bread", "eggs", "butter", "cheese"]).unwrap();
        let encoder = BasketEncoder::from_vocabulary(&vocab);
        let bundle = ArtifactBundle::new("test", vocab, encoder, Arc::new(scorer)).unwrap();
        let store = Arc::new(ArtifactStore::with_bundle(bundle));
        PredictionService::new(store, &Config::default())
    }

    #[tokio::test]
    async fn test_predict_grocery_scenario() {
        let mut scorer = mock_scorer(5);
        scorer
            .expect_score()
            .withf(|input| input.to_vec() == vec![1.0, 0.0, 1.0, 0.0, 0.0])
            .times(1)
            .returning(|_| Ok(array![0.1, 0.9, 0.0, 0.7, 0.3]));

        let service = service_with(scorer);
        let prediction = service.predict_top(&["milk", "eggs"], 3).await.unwrap();

        let items: Vec<&str> = prediction
            .predicted_items
            .iter()
            .map(|p| p.item.as_str())
            .collect();
        assert_eq!(items, vec!["bread", "butter", "cheese"]);
        assert_eq!(prediction.basket, vec!["milk", "eggs"]);
        assert!(prediction.unknown_items.is_empty());
        assert_eq!(prediction.model_version, "test");
    }

    #[tokio::test]
    async fn test_zero_k_never_reaches_scorer() {
        let mut scorer = mock_scorer(5);
        scorer.expect_score().times(0);

        let service = service_with(scorer);
        let result = service.predict_top(&["milk"], 0).await;

        assert!(matches!(result, Err(PredictionError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_malformed_json_never_reaches_scorer() {
        let mut scorer = mock_scorer(5);
        scorer.expect_score().times(0);

        let service = service_with(scorer);
        let result = service
            .predict_json(&serde_json::json!({"items": ["milk", null]}))
            .await;

        assert!(matches!(result, Err(PredictionError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_invalid_output_disables_bundle() {
        let mut scorer = mock_scorer(5);
        scorer
            .expect_score()
            .times(1)
            .returning(|_| Ok(array![0.1, f32::NAN, 0.2, 0.3, 0.4]));

        let service = service_with(scorer);

        let first = service.predict(&["milk"]).await;
        assert!(matches!(
            first,
            Err(PredictionError::Scoring(ScoringError::InvalidValue { .. }))
        ));

        // Fails fast without calling the scorer a second time
        let second = service.predict(&["milk"]).await;
        assert!(matches!(second, Err(PredictionError::ModelUnavailable(_))));
        assert!(!service.model_info().unwrap().usable);
    }

    #[tokio::test]
    async fn test_scorer_error_is_not_retried() {
        let mut scorer = mock_scorer(5);
        scorer
            .expect_score()
            .times(1)
            .returning(|_| Err(ScoringError::Inference("boom".to_string())));

        let service = service_with(scorer);
        let result = service.predict(&["milk"]).await;

        assert!(matches!(
            result,
            Err(PredictionError::Scoring(ScoringError::Inference(_)))
        ));
    }

    #[tokio::test]
    async fn test_unloaded_store_is_unavailable() {
        let store = Arc::new(ArtifactStore::new("/nonexistent", "current"));
        let service = PredictionService::new(store, &Config::default());

        let result = service.predict(&["milk"]).await;
        assert!(matches!(result, Err(PredictionError::ModelUnavailable(_))));
        assert!(matches!(
            service.model_info(),
            Err(PredictionError::ModelUnavailable(_))
        ));
    }
}
