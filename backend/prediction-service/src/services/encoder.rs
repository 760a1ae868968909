/// Basket Encoder
///
/// Multi-hot transform of a basket over the vocabulary. Encoding is a pure
/// function of (basket, encoder state): unknown names are collected, not
/// rejected, and repeated names have no additional effect.
use super::vocabulary::Vocabulary;
use crate::error::{ArtifactError, EncodingError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Persisted encoder parameters: the multi-hot column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderState {
    pub classes: Vec<String>,
}

impl EncoderState {
    pub fn for_vocabulary(vocab: &Vocabulary) -> Self {
        Self {
            classes: vocab.items().to_vec(),
        }
    }
}

/// Result of encoding one basket
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBasket {
    pub vector: Array1<f32>,
    /// Names not in the vocabulary, first occurrence order, without repeats
    pub unknown_items: Vec<String>,
}

impl EncodedBasket {
    pub fn known_count(&self) -> usize {
        self.vector.iter().filter(|v| **v > 0.0).count()
    }
}

#[derive(Debug, Clone)]
pub struct BasketEncoder {
    columns: HashMap<String, usize>,
    width: usize,
}

impl BasketEncoder {
    /// Encoder whose columns follow the vocabulary index order.
    pub fn from_vocabulary(vocab: &Vocabulary) -> Self {
        let columns = vocab
            .items()
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self {
            columns,
            width: vocab.len(),
        }
    }

    /// Restore a persisted encoder, checking it agrees with the vocabulary.
    pub fn from_state(state: &EncoderState, vocab: &Vocabulary) -> Result<Self, ArtifactError> {
        if state.classes.len() != vocab.len() {
            return Err(ArtifactError::EncoderMismatch(format!(
                "{} encoder classes for {} vocabulary items",
                state.classes.len(),
                vocab.len()
            )));
        }

        for (column, class) in state.classes.iter().enumerate() {
            match vocab.index_of(class) {
                Some(idx) if idx == column => {}
                Some(idx) => {
                    return Err(ArtifactError::EncoderMismatch(format!(
                        "class {} is column {} but vocabulary index {}",
                        class, column, idx
                    )))
                }
                None => {
                    return Err(ArtifactError::EncoderMismatch(format!(
                        "class {} is not in the vocabulary",
                        class
                    )))
                }
            }
        }

        Ok(Self::from_vocabulary(vocab))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn encode<S: AsRef<str>>(&self, basket: &[S]) -> EncodedBasket {
        let mut vector = Array1::zeros(self.width);
        let mut unknown_items = Vec::new();
        let mut seen_unknown = HashSet::new();

        for item in basket {
            let name = item.as_ref();
            match self.columns.get(name) {
                Some(&column) => vector[column] = 1.0,
                None => {
                    if seen_unknown.insert(name) {
                        unknown_items.push(name.to_string());
                    }
                }
            }
        }

        debug!(
            basket_size = basket.len(),
            unknown = unknown_items.len(),
            "Encoded basket"
        );

        EncodedBasket {
            vector,
            unknown_items,
        }
    }
}

/// Extract item names from a JSON basket: either `["a", "b"]` or
/// `{"items": ["a", "b"]}`.
pub fn parse_basket(value: &serde_json::Value) -> Result<Vec<String>, EncodingError> {
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(map) => match map.get("items") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => return Err(EncodingError::NotAList),
        },
        _ => return Err(EncodingError::NotAList),
    };

    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| match entry {
            serde_json::Value::String(name) => Ok(name.clone()),
            other => Err(EncodingError::NonStringEntry {
                position,
                found: other.to_string(),
            }),
        })
        .collect()
}
