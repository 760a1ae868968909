/// Ranker
///
/// Turns a validated score vector into the top-K recommendation list:
/// basket items are excluded, order is score descending with ties broken by
/// ascending vocabulary index, and the raw probabilities are reported as
/// percentages without renormalizing over the truncated set.
use super::vocabulary::Vocabulary;
use crate::error::{PredictionError, Result, ScoringError};
use crate::models::PredictedItem;
use ndarray::Array1;
use std::cmp::Ordering;
use std::collections::HashSet;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker;

impl Ranker {
    pub fn new() -> Self {
        Self
    }

    pub fn top_k<S: AsRef<str>>(
        &self,
        scores: &Array1<f32>,
        basket: &[S],
        vocab: &Vocabulary,
        k: usize,
    ) -> Result<Vec<PredictedItem>> {
        if k == 0 {
            return Err(PredictionError::InvalidRequest(
                "k must be a positive integer".to_string(),
            ));
        }
        if scores.len() != vocab.len() {
            return Err(ScoringError::WidthMismatch {
                expected: vocab.len(),
                actual: scores.len(),
            }
            .into());
        }

        let excluded: HashSet<usize> = basket
            .iter()
            .filter_map(|item| vocab.index_of(item.as_ref()))
            .collect();

        let mut eligible: Vec<(usize, f32)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(idx, _)| !excluded.contains(idx))
            .collect();

        // Scores are validated upstream, so partial_cmp only sees finite values
        eligible.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        eligible.truncate(k);

        Ok(eligible
            .into_iter()
            .filter_map(|(idx, score)| {
                vocab.name_of(idx).map(|name| PredictedItem {
                    item: name.to_string(),
                    probability: f64::from(score) * 100.0,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn vocab() -> Vocabulary {
        Vocabulary::from_items(["milk", "bread", "eggs", "butter", "cheese"]).unwrap()
    }

    fn names(items: &[PredictedItem]) -> Vec<&str> {
        items.iter().map(|p| p.item.as_str()).collect()
    }

    #[test]
    fn test_grocery_scenario() {
        let scores = array![0.1, 0.9, 0.0, 0.7, 0.3];
        let ranked = Ranker::new()
            .top_k(&scores, &["milk", "eggs"], &vocab(), 3)
            .unwrap();

        assert_eq!(names(&ranked), vec!["bread", "butter", "cheese"]);
        assert!((ranked[0].probability - 90.0).abs() < 1e-3);
        assert!((ranked[1].probability - 70.0).abs() < 1e-3);
        assert!((ranked[2].probability - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_ties_break_by_vocabulary_index() {
        let scores = array![0.5, 0.5, 0.5, 0.9, 0.5];
        let ranker = Ranker::new();

        let first = ranker.top_k::<&str>(&scores, &[], &vocab(), 5).unwrap();
        assert_eq!(names(&first), vec!["butter", "milk", "bread", "eggs", "cheese"]);

        for _ in 0..10 {
            let again = ranker.top_k::<&str>(&scores, &[], &vocab(), 5).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_fewer_eligible_than_k() {
        let scores = array![0.1, 0.2, 0.3, 0.4, 0.5];
        let ranked = Ranker::new()
            .top_k(&scores, &["milk", "bread", "eggs"], &vocab(), 5)
            .unwrap();

        assert_eq!(names(&ranked), vec!["cheese", "butter"]);
    }

    #[test]
    fn test_full_basket_yields_empty() {
        let scores = array![0.1, 0.2, 0.3, 0.4, 0.5];
        let basket = ["milk", "bread", "eggs", "butter", "cheese"];
        let ranked = Ranker::new().top_k(&scores, &basket, &vocab(), 5).unwrap();

        assert!(ranked.is_empty());
    }

    #[test]
    fn test_unknown_basket_items_do_not_exclude() {
        let scores = array![0.1, 0.2, 0.3, 0.4, 0.5];
        let ranked = Ranker::new()
            .top_k(&scores, &["kombucha"], &vocab(), 5)
            .unwrap();

        assert_eq!(ranked.len(), 5);
    }

    #[test]
    fn test_zero_k_is_invalid_request() {
        let scores = array![0.1, 0.2, 0.3, 0.4, 0.5];
        let result = Ranker::new().top_k::<&str>(&scores, &[], &vocab(), 0);

        assert!(matches!(result, Err(PredictionError::InvalidRequest(_))));
    }

    #[test]
    fn test_probability_widens_before_scaling() {
        let scores = array![0.1, 0.9, 0.0, 0.7, 0.3];
        let ranked = Ranker::new()
            .top_k(&scores, &["milk", "eggs"], &vocab(), 3)
            .unwrap();

        assert_eq!(ranked[2].item, "cheese");
        assert_eq!(ranked[2].probability, f64::from(0.3f32) * 100.0);
        assert!((ranked[2].probability - 30.0).abs() < 1e-5);
    }

    #[test]
    fn test_score_width_mismatch_is_system_fault() {
        let scores = array![0.1, 0.2, 0.3];
        let result = Ranker::new().top_k::<&str>(&scores, &[], &vocab(), 5);

        match result {
            Err(err) => {
                assert!(matches!(
                    err,
                    PredictionError::Scoring(ScoringError::WidthMismatch {
                        expected: 5,
                        actual: 3
                    })
                ));
                assert_eq!(err.class(), crate::error::ErrorClass::System);
            }
            Ok(_) => panic!("mismatched score vector must be rejected"),
        }
    }

    #[test]
    fn test_no_renormalization_after_truncation() {
        let scores = array![0.05, 0.05, 0.05, 0.05, 0.8];
        let ranked = Ranker::new().top_k::<&str>(&scores, &[], &vocab(), 1).unwrap();

        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].probability - 80.0).abs() < 1e-3);
    }
}
