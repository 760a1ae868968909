//! Prediction Service - Main entry point
//!
//! Loads the configured model bundle and answers newline-delimited JSON
//! commands on stdin, one JSON line per command on stdout:
//!
//! ```text
//! {"predict": {"items": ["milk", "eggs"]}}
//! {"load": {"version": "20240101_120000"}}
//! {"reload": {}}
//! {"model_info": {}}
//! {"status": {}}
//! {"metrics": {}}
//! ```

use anyhow::Result;
use prediction_service::{
    metrics, ArtifactBundle, ArtifactError, ArtifactStore, Config, PredictionError,
    PredictionService,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Command {
    Predict(Value),
    Load { version: String },
    Reload {},
    ModelInfo {},
    Status {},
    Metrics {},
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries responses
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prediction_service=info,info".into()),
        )
        .with(json_logs.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    info!(
        "Starting {} v{} (artifacts: {}, version: {}, top_k: {})",
        config.service_name,
        env!("CARGO_PKG_VERSION"),
        config.artifact_root.display(),
        config.model_version,
        config.top_k
    );

    let store = Arc::new(ArtifactStore::new(
        config.artifact_root.clone(),
        config.model_version.clone(),
    ));

    // Keep running without a model; requests get ModelUnavailable until a load succeeds
    if let Err(e) = store.load(&config.model_version).await {
        warn!(error = %e, "Starting without a usable model bundle");
    }

    let service = PredictionService::new(Arc::clone(&store), &config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(line) {
            Ok(command) => handle(&service, command).await,
            Err(e) => prediction_error(PredictionError::InvalidRequest(format!(
                "unrecognized command: {}",
                e
            ))),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    info!("Input closed, shutting down");
    Ok(())
}

async fn handle(service: &PredictionService, command: Command) -> Value {
    match command {
        Command::Predict(body) => match service.predict_json(&body).await {
            Ok(prediction) => json!({ "ok": prediction }),
            Err(e) => prediction_error(e),
        },
        Command::Load { version } => artifact_result(service.store().load(&version).await),
        Command::Reload {} => artifact_result(service.store().reload().await),
        Command::ModelInfo {} => match service.model_info() {
            Ok(info) => json!({ "ok": info }),
            Err(e) => prediction_error(e),
        },
        Command::Status {} => json!({ "ok": service.status() }),
        Command::Metrics {} => json!({ "ok": metrics::gather_text() }),
    }
}

fn prediction_error(err: PredictionError) -> Value {
    json!({ "error": err.to_response() })
}

fn artifact_result(result: std::result::Result<Arc<ArtifactBundle>, ArtifactError>) -> Value {
    match result {
        Ok(bundle) => json!({ "ok": bundle.info() }),
        Err(e) => json!({
            "error": {
                "code": "artifact_error",
                "class": "system",
                "message": e.to_string(),
                "retryable": false,
            }
        }),
    }
}
