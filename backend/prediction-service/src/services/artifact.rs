/// Artifact Bundle & Store
///
/// A bundle is the triple {vocabulary, encoder state, scorer} for one model
/// version, validated as a whole before anything can serve from it. The store
/// owns the single pointer requests read; loads build a complete bundle off
/// to the side and swap the pointer only once validation has passed.
///
/// # Layout
/// ```text
/// <root>/<version>/item_mapping.json   {"milk": 0, "bread": 1, ...}
/// <root>/<version>/encoder.json        {"classes": ["milk", "bread", ...]}
/// <root>/<version>/scorer.json         dense weights, or
/// <root>/<version>/model.onnx          exported graph
/// <root>/<version>/metrics.json        optional training metrics
/// <root>/current -> <version>          written by the training job
/// ```
use super::encoder::{BasketEncoder, EncoderState};
use super::scorer::{DenseScorer, DenseScorerSpec, OnnxScorer, Scorer};
use super::vocabulary::Vocabulary;
use crate::error::ArtifactError;
use crate::metrics::ArtifactMetrics;
use crate::models::{BundleState, ModelInfo, StoreStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub const VOCABULARY_FILE: &str = "item_mapping.json";
pub const ENCODER_FILE: &str = "encoder.json";
pub const DENSE_SCORER_FILE: &str = "scorer.json";
pub const ONNX_SCORER_FILE: &str = "model.onnx";
pub const METRICS_FILE: &str = "metrics.json";

pub struct ArtifactBundle {
    version: String,
    vocabulary: Vocabulary,
    encoder: BasketEncoder,
    scorer: Arc<dyn Scorer>,
    training_metrics: Option<serde_json::Value>,
    loaded_at: DateTime<Utc>,
    /// Set on the first scorer fault; never cleared for this bundle
    fault: RwLock<Option<String>>,
}

impl fmt::Debug for ArtifactBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactBundle")
            .field("version", &self.version)
            .field("items", &self.vocabulary.len())
            .field("scorer", &self.scorer.kind())
            .field("loaded_at", &self.loaded_at)
            .field("fault", &*self.fault.read())
            .finish()
    }
}

impl ArtifactBundle {
    /// Assemble a bundle from parts, rejecting any width disagreement.
    pub fn new(
        version: impl Into<String>,
        vocabulary: Vocabulary,
        encoder: BasketEncoder,
        scorer: Arc<dyn Scorer>,
    ) -> Result<Self, ArtifactError> {
        let version = version.into();
        validate_version(&version)?;

        let expected = vocabulary.len();
        if encoder.width() != expected {
            return Err(ArtifactError::EncoderMismatch(format!(
                "encoder width {} for {} vocabulary items",
                encoder.width(),
                expected
            )));
        }
        if scorer.input_width() != expected {
            return Err(ArtifactError::WidthMismatch {
                dimension: "input",
                expected,
                actual: scorer.input_width(),
            });
        }
        if scorer.output_width() != expected {
            return Err(ArtifactError::WidthMismatch {
                dimension: "output",
                expected,
                actual: scorer.output_width(),
            });
        }

        Ok(Self {
            version,
            vocabulary,
            encoder,
            scorer,
            training_metrics: None,
            loaded_at: Utc::now(),
            fault: RwLock::new(None),
        })
    }

    pub fn with_training_metrics(mut self, metrics: serde_json::Value) -> Self {
        self.training_metrics = Some(metrics);
        self
    }

    /// Read and validate `<root>/<version>`. Blocking; run off the runtime.
    pub fn load(root: &Path, version: &str) -> Result<Self, ArtifactError> {
        validate_version(version)?;

        let dir = root.join(version);
        if !dir.is_dir() {
            return Err(ArtifactError::NotFound(dir));
        }

        // `current` is a symlink; report the version it points at
        let resolved = fs::canonicalize(&dir).map_err(|source| ArtifactError::Io {
            path: dir.clone(),
            source,
        })?;
        let resolved_version = resolved
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| version.to_string());

        let mapping: HashMap<String, usize> = read_json(&resolved, VOCABULARY_FILE, "vocabulary")?;
        let vocabulary = Vocabulary::from_index_map(mapping)?;

        let state: EncoderState = read_json(&resolved, ENCODER_FILE, "encoder")?;
        let encoder = BasketEncoder::from_state(&state, &vocabulary)?;

        let scorer = load_scorer(&resolved, vocabulary.len())?;

        let bundle = Self::new(resolved_version, vocabulary, encoder, scorer)?;

        let metrics_path = resolved.join(METRICS_FILE);
        if metrics_path.exists() {
            match read_json::<serde_json::Value>(&resolved, METRICS_FILE, "metrics") {
                Ok(metrics) => return Ok(bundle.with_training_metrics(metrics)),
                Err(e) => warn!(error = %e, "Ignoring unreadable training metrics"),
            }
        }

        Ok(bundle)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn encoder(&self) -> &BasketEncoder {
        &self.encoder
    }

    pub fn scorer(&self) -> Arc<dyn Scorer> {
        Arc::clone(&self.scorer)
    }

    pub fn is_usable(&self) -> bool {
        self.fault.read().is_none()
    }

    /// Reason this bundle stopped serving, if it did
    pub fn fault(&self) -> Option<String> {
        self.fault.read().clone()
    }

    pub(crate) fn mark_unusable(&self, reason: impl Into<String>) {
        let mut fault = self.fault.write();
        if fault.is_none() {
            *fault = Some(reason.into());
        }
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            version: self.version.clone(),
            item_count: self.vocabulary.len(),
            scorer: self.scorer.kind(),
            loaded_at: self.loaded_at,
            training_metrics: self.training_metrics.clone(),
            usable: self.is_usable(),
        }
    }
}

fn validate_version(version: &str) -> Result<(), ArtifactError> {
    let malformed = version.trim().is_empty()
        || version == "."
        || version == ".."
        || version.contains('/')
        || version.contains('\\');
    if malformed {
        return Err(ArtifactError::InvalidVersion(version.to_string()));
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(
    dir: &Path,
    file: &str,
    part: &'static str,
) -> Result<T, ArtifactError> {
    let path = dir.join(file);
    if !path.exists() {
        return Err(ArtifactError::MissingPart {
            part,
            dir: dir.to_path_buf(),
        });
    }

    let raw = fs::read_to_string(&path).map_err(|source| ArtifactError::Io {
        path: path.clone(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|e| ArtifactError::Parse {
        path,
        message: e.to_string(),
    })
}

fn load_scorer(dir: &Path, width: usize) -> Result<Arc<dyn Scorer>, ArtifactError> {
    let dense = dir.join(DENSE_SCORER_FILE);
    let onnx = dir.join(ONNX_SCORER_FILE);

    match (dense.exists(), onnx.exists()) {
        (true, true) => Err(ArtifactError::AmbiguousScorer {
            first: DENSE_SCORER_FILE,
            second: ONNX_SCORER_FILE,
        }),
        (true, false) => {
            let spec: DenseScorerSpec = read_json(dir, DENSE_SCORER_FILE, "scorer")?;
            Ok(Arc::new(DenseScorer::from_spec(spec)?))
        }
        (false, true) => Ok(Arc::new(OnnxScorer::load(&onnx, width)?)),
        (false, false) => Err(ArtifactError::MissingPart {
            part: "scorer",
            dir: dir.to_path_buf(),
        }),
    }
}

#[derive(Debug)]
struct LoadStatus {
    state: BundleState,
    requested_version: String,
    last_error: Option<String>,
}

/// Owner of the serving bundle pointer.
///
/// Readers clone the `Arc` under a short read lock and keep using that bundle
/// for the whole request, so a concurrent swap never mixes versions.
pub struct ArtifactStore {
    root: PathBuf,
    current: RwLock<Option<Arc<ArtifactBundle>>>,
    status: RwLock<LoadStatus>,
    /// Serializes load, reload and publish
    reload_lock: Mutex<()>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            current: RwLock::new(None),
            status: RwLock::new(LoadStatus {
                state: BundleState::Unloaded,
                requested_version: version.into(),
                last_error: None,
            }),
            reload_lock: Mutex::new(()),
        }
    }

    /// Store serving a prebuilt bundle (tests, embedded models).
    pub fn with_bundle(bundle: ArtifactBundle) -> Self {
        let version = bundle.version().to_string();
        let store = Self::new(PathBuf::new(), version);
        *store.current.write() = Some(Arc::new(bundle));
        store.status.write().state = BundleState::Ready;
        store
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current(&self) -> Option<Arc<ArtifactBundle>> {
        self.current.read().clone()
    }

    pub fn status(&self) -> StoreStatus {
        let current = self.current();
        let status = self.status.read();

        // A faulted bundle stays installed but answers nothing
        if let Some(fault) = current.as_ref().and_then(|b| b.fault()) {
            return StoreStatus {
                state: BundleState::Disabled,
                serving_version: current.map(|b| b.version().to_string()),
                last_error: Some(fault),
            };
        }

        StoreStatus {
            state: status.state,
            serving_version: current.map(|b| b.version().to_string()),
            last_error: status.last_error.clone(),
        }
    }

    /// Load `version` and publish it if, and only if, it validates.
    ///
    /// On failure the previously published bundle (if any) keeps serving.
    pub async fn load(&self, version: &str) -> Result<Arc<ArtifactBundle>, ArtifactError> {
        let _guard = self.reload_lock.lock().await;

        {
            let mut status = self.status.write();
            status.state = BundleState::Loading;
            status.requested_version = version.to_string();
        }

        info!(root = %self.root.display(), version, "Loading model artifacts");

        let root = self.root.clone();
        let requested = version.to_string();
        let result = tokio::task::spawn_blocking(move || ArtifactBundle::load(&root, &requested))
            .await
            .map_err(|e| ArtifactError::Task(e.to_string()))
            .and_then(|loaded| loaded);

        match result {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                self.swap(Arc::clone(&bundle));
                ArtifactMetrics::record_load("success");
                info!(
                    version = bundle.version(),
                    items = bundle.vocabulary().len(),
                    scorer = bundle.scorer().kind(),
                    "Model bundle published"
                );
                Ok(bundle)
            }
            Err(e) => {
                {
                    let mut status = self.status.write();
                    status.state = BundleState::Failed;
                    status.last_error = Some(e.to_string());
                }
                ArtifactMetrics::record_load("failure");
                error!(
                    version,
                    error = %e,
                    serving = ?self.current().map(|b| b.version().to_string()),
                    "Model bundle rejected"
                );
                Err(e)
            }
        }
    }

    /// Reload the most recently requested version (re-resolving `current`).
    pub async fn reload(&self) -> Result<Arc<ArtifactBundle>, ArtifactError> {
        let version = self.status.read().requested_version.clone();
        self.load(&version).await
    }

    /// Publish an already validated bundle.
    pub async fn publish(&self, bundle: ArtifactBundle) -> Arc<ArtifactBundle> {
        let _guard = self.reload_lock.lock().await;
        let bundle = Arc::new(bundle);
        self.status.write().requested_version = bundle.version().to_string();
        self.swap(Arc::clone(&bundle));
        info!(version = bundle.version(), "Model bundle published");
        bundle
    }

    fn swap(&self, bundle: Arc<ArtifactBundle>) {
        let previous = self.current.write().replace(bundle);
        let mut status = self.status.write();
        status.state = BundleState::Ready;
        status.last_error = None;
        if let Some(previous) = previous {
            info!(previous = previous.version(), "Retired model bundle");
        }
    }
}
