use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PredictionError>;

/// Errors surfaced to callers of the prediction pipeline.
///
/// Unknown basket items never appear here; they ride along on a successful
/// result as `unknown_items`.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ScoringError),
}

/// Who has to act on an error: the caller fixing its input, or the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Caller,
    System,
}

impl PredictionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PredictionError::InvalidRequest(_) => ErrorClass::Caller,
            PredictionError::ModelUnavailable(_) | PredictionError::Scoring(_) => {
                ErrorClass::System
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PredictionError::InvalidRequest(_) => "invalid_request",
            PredictionError::ModelUnavailable(_) => "model_unavailable",
            PredictionError::Scoring(_) => "scoring_error",
        }
    }

    /// System faults may succeed later; caller faults never do without new input.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::System
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            class: self.class(),
            message: self.to_string(),
            retryable: self.is_retryable(),
        }
    }
}

impl From<EncodingError> for PredictionError {
    fn from(err: EncodingError) -> Self {
        PredictionError::InvalidRequest(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub class: ErrorClass,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("vocabulary is empty")]
    Empty,

    #[error("blank item name at index {0}")]
    BlankName(usize),

    #[error("duplicate item name: {0}")]
    DuplicateName(String),

    #[error("index {index} assigned to both {first} and {second}")]
    DuplicateIndex {
        index: usize,
        first: String,
        second: String,
    },

    #[error("index {index} of {name} out of range for {size} items")]
    IndexOutOfRange {
        name: String,
        index: usize,
        size: usize,
    },
}

/// Type-level malformation of a basket. Unknown names are not encoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("basket must be a list of item names or an object with an `items` list")]
    NotAList,

    #[error("basket entry {position} is not a string: {found}")]
    NonStringEntry { position: usize, found: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    #[error("scorer returned {actual} scores, expected {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("scorer returned out-of-range value {value} at index {index}")]
    InvalidValue { index: usize, value: f32 },

    #[error("scoring timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl ScoringError {
    /// Whether the failure makes the scorer itself suspect.
    ///
    /// A timeout says nothing about the artifact; anything else does, and the
    /// serving bundle stays unusable until the next successful load.
    pub fn poisons_scorer(&self) -> bool {
        !matches!(self, ScoringError::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("invalid version identifier: {0:?}")]
    InvalidVersion(String),

    #[error("artifact directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("missing artifact part `{part}` in {}", .dir.display())]
    MissingPart { part: &'static str, dir: PathBuf },

    #[error("both {first} and {second} present; expected exactly one scorer")]
    AmbiguousScorer {
        first: &'static str,
        second: &'static str,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid vocabulary: {0}")]
    Vocabulary(#[from] VocabularyError),

    #[error("encoder classes do not match vocabulary: {0}")]
    EncoderMismatch(String),

    #[error("scorer {dimension} width {actual} does not match vocabulary size {expected}")]
    WidthMismatch {
        dimension: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid scorer: {0}")]
    InvalidScorer(String),

    #[error("artifact load task failed: {0}")]
    Task(String),
}
