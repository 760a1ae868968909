/// Item Vocabulary
///
/// Fixed bijection between item names and indices `0..N`, built once per
/// artifact version and shared read-only by every request.
use crate::error::VocabularyError;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    /// Item names in index order
    items: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build from names in index order (name at position `i` gets index `i`).
    pub fn from_items<I, S>(items: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        if items.is_empty() {
            return Err(VocabularyError::Empty);
        }

        let mut index = HashMap::with_capacity(items.len());
        for (i, name) in items.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(VocabularyError::BlankName(i));
            }
            if index.insert(name.clone(), i).is_some() {
                return Err(VocabularyError::DuplicateName(name.clone()));
            }
        }

        Ok(Self { items, index })
    }

    /// Build from a `name -> index` mapping, as written by the training job.
    ///
    /// Indices must cover `0..N` exactly once.
    pub fn from_index_map(mapping: HashMap<String, usize>) -> Result<Self, VocabularyError> {
        if mapping.is_empty() {
            return Err(VocabularyError::Empty);
        }

        let size = mapping.len();
        let mut slots: Vec<Option<String>> = vec![None; size];

        // Sorted so that error reports do not depend on hash order
        let mut entries: Vec<(String, usize)> = mapping.into_iter().collect();
        entries.sort();

        for (name, idx) in entries {
            if idx >= size {
                return Err(VocabularyError::IndexOutOfRange {
                    name,
                    index: idx,
                    size,
                });
            }
            if let Some(first) = &slots[idx] {
                return Err(VocabularyError::DuplicateIndex {
                    index: idx,
                    first: first.clone(),
                    second: name,
                });
            }
            slots[idx] = Some(name);
        }

        // Every slot is filled: `size` distinct in-range indices for `size` slots
        Self::from_items(slots.into_iter().flatten())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }
}
