//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::ExoError;
use crate::imagegen::{build_planet_prompt, sanitize_name};
use crate::gemini::{build_general_prompt, build_specific_prompt};
use crate::query;
use crate::registry::TrainingReport;
use crate::training;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Run one training pass off the async runtime, against a config snapshot
/// taken before the fit starts. Concurrent calls race; last publish wins.
pub async fn run_training(state: &Arc<AppState>) -> TrainingReport {
    let config = state.config.snapshot();
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || training::train_and_publish(&config, &state.registry))
        .await
        .unwrap_or_else(|e| TrainingReport::failure(format!("training task panicked: {}", e)))
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes")
}

// ============================================================================
// Prediction and listing handlers
// ============================================================================

/// Classify every KOI row carrying the given kepid.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Path(kepid): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let results = query::predict_by_kepid(&state.registry, kepid)?;
    Ok(Json(json!({ "results": results })))
}

/// Full processed rows as JSON records.
pub async fn planets(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let generation = state
        .registry
        .current()
        .ok_or(ServerError::Core(ExoError::ModelNotTrained))?;
    let records = query::raw_records(&generation.dataset).map_err(ServerError::Core)?;
    Ok(Json(serde_json::Value::Array(records)))
}

/// Reduced per-row records.
pub async fn general_data(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let generation = state
        .registry
        .current()
        .ok_or(ServerError::Core(ExoError::ModelNotTrained))?;
    let entries = query::general_entries(&generation.dataset);
    Ok(Json(json!(entries)))
}

/// Look up planets by kepoi_name, case-insensitively.
pub async fn planet_by_kepoi(
    State(state): State<Arc<AppState>>,
    Path(kepoi_name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let generation = state
        .registry
        .current()
        .ok_or(ServerError::Core(ExoError::ModelNotTrained))?;

    let rows = query::find_rows_by_kepoi(&generation.dataset, &kepoi_name).map_err(ServerError::Core)?;
    if rows.is_empty() {
        return Err(ServerError::Core(ExoError::NotFound(format!(
            "no planet found with kepoi_name: {}",
            kepoi_name
        ))));
    }

    let entries: Vec<_> = rows
        .iter()
        .map(|&row| query::general_entry_at(&generation.dataset, row))
        .collect();
    Ok(Json(json!(entries)))
}

// ============================================================================
// Configuration handlers
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct HyperparamsBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
}

/// Update hyperparameters and retrain with the new configuration.
pub async fn set_hyperparams(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HyperparamsBody>,
) -> Response {
    let patch = crate::config::ConfigPatch {
        tree_count: body.tree_count,
        max_depth: body.max_depth,
        random_seed: body.random_seed,
        dataset_path: None,
    };
    let effective = state.config.update(&patch);
    info!(
        trees = effective.tree_count,
        seed = effective.random_seed,
        "Hyperparameters updated, retraining"
    );

    let report = run_training(&state).await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(json!({
            "updated": body,
            "train": report.success,
            "model_info": report,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct PathBody {
    pub path: Option<std::path::PathBuf>,
}

/// Point at a different dataset file and retrain.
pub async fn set_path(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PathBody>,
) -> Result<Response> {
    let path = body
        .path
        .ok_or_else(|| ServerError::BadRequest("Missing 'path' in body".to_string()))?;
    let effective = state.config.set_dataset_path(path);
    info!(path = %effective.dataset_path.display(), "Dataset path updated, retraining");

    let report = run_training(&state).await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((
        status,
        Json(json!({
            "path": effective.dataset_path,
            "train": report.success,
            "model_info": report,
        })),
    )
        .into_response())
}

// ============================================================================
// Upload and CSV management
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
    pub retrain: Option<String>,
}

/// Accept a raw CSV body, save it under the upload directory, and make it
/// the current dataset. `X-Filename` header or `?filename=` names the file;
/// `?retrain=1` retrains immediately.
pub async fn upload_csv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let filename = headers
        .get("x-filename")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or(params.filename)
        .ok_or_else(|| {
            ServerError::BadRequest(
                "Missing filename. Provide X-Filename header or ?filename query parameter."
                    .to_string(),
            )
        })?;

    let safe = sanitize_name(&filename);
    let upload_dir = state.config.snapshot().upload_dir;
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| ServerError::Core(e.into()))?;
    let dest = upload_dir.join(&safe);
    tokio::fs::write(&dest, &body)
        .await
        .map_err(|e| ServerError::Core(e.into()))?;

    info!(path = %dest.display(), bytes = body.len(), "CSV uploaded");
    state.config.set_dataset_path(dest.clone());

    let mut response = json!({ "saved": dest });
    if params.retrain.as_deref().map(is_truthy).unwrap_or(false) {
        let report = run_training(&state).await;
        response["retrain"] = json!(report.success);
        response["model_info"] = json!(report);
    }
    Ok(Json(response))
}

/// List CSV files in the upload directory.
pub async fn list_csvs(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let upload_dir = state.config.snapshot().upload_dir;
    let mut names = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&upload_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && name.to_lowercase().ends_with(".csv") {
                names.push(name);
            }
        }
    }
    names.sort();
    Ok(Json(json!({ "csvs": names })))
}

#[derive(Debug, Deserialize)]
pub struct SelectBody {
    pub filename: Option<String>,
    pub retrain: Option<bool>,
}

async fn select_csv_inner(
    state: &Arc<AppState>,
    filename: &str,
    retrain: bool,
) -> Result<Json<serde_json::Value>> {
    let safe = sanitize_name(filename);
    let src = state.config.snapshot().upload_dir.join(&safe);
    if tokio::fs::metadata(&src).await.is_err() {
        return Err(ServerError::Core(ExoError::NotFound(format!(
            "file not found: {}",
            filename
        ))));
    }

    state.config.set_dataset_path(src.clone());
    info!(path = %src.display(), "Uploaded CSV selected as current dataset");

    let mut response = json!({ "selected": src });
    if retrain {
        let report = run_training(state).await;
        response["retrain"] = json!(report.success);
        response["model_info"] = json!(report);
    }
    Ok(Json(response))
}

/// Select an uploaded CSV as the current dataset via JSON body.
pub async fn select_csv(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectBody>,
) -> Result<Json<serde_json::Value>> {
    let filename = body
        .filename
        .ok_or_else(|| ServerError::BadRequest("Missing 'filename' in body".to_string()))?;
    select_csv_inner(&state, &filename, body.retrain.unwrap_or(false)).await
}

#[derive(Debug, Deserialize)]
pub struct SelectQuery {
    pub retrain: Option<String>,
}

/// Select an uploaded CSV by name in the path.
pub async fn select_csv_by_name(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    Query(params): Query<SelectQuery>,
) -> Result<Json<serde_json::Value>> {
    let retrain = params.retrain.as_deref().map(is_truthy).unwrap_or(false);
    select_csv_inner(&state, &filename, retrain).await
}

// ============================================================================
// Model inspection
// ============================================================================

/// Report of the most recent training attempt (success or failure).
pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.registry.report() {
        Some(report) => Json(json!(report)),
        None => Json(json!({})),
    }
}

/// Precision metrics of the current model, per class and aggregated.
pub async fn model_precision(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>> {
    let metrics = state
        .registry
        .report()
        .and_then(|r| r.metrics)
        .ok_or_else(|| {
            ServerError::BadRequest(
                "Model info not available. Train or upload dataset first.".to_string(),
            )
        })?;

    let report = &metrics.classification_report;
    Ok(Json(json!({
        "per_class": report.per_class,
        "aggregates": {
            "macro avg": report.macro_avg,
            "weighted avg": report.weighted_avg,
        },
        "accuracy": metrics.accuracy,
    })))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "model_trained": state.registry.is_trained(),
    }))
}

// ============================================================================
// Explanation handlers
// ============================================================================

/// Spanish explanation of the current model's evaluation.
pub async fn explain_general(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>> {
    let metrics = state
        .registry
        .report()
        .and_then(|r| r.metrics)
        .ok_or_else(|| {
            ServerError::BadRequest(
                "Model info not available. Train or upload dataset first.".to_string(),
            )
        })?;

    let prompt = build_general_prompt(&metrics);
    let text = state.gemini.explain(&prompt).await.map_err(ServerError::Core)?;
    Ok(Json(json!({ "explanation": text })))
}

/// Spanish explanation of one planet, with its prediction when available.
pub async fn explain_planet(
    State(state): State<Arc<AppState>>,
    Path(kepoi_name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let generation = state
        .registry
        .current()
        .ok_or(ServerError::Core(ExoError::ModelNotTrained))?;

    let row = query::find_row_by_kepoi(&generation.dataset, &kepoi_name)
        .map_err(ServerError::Core)?
        .ok_or_else(|| {
            ServerError::Core(ExoError::NotFound(format!(
                "no planet found with kepoi_name: {}",
                kepoi_name
            )))
        })?;

    let entry = query::general_entry_at(&generation.dataset, row);
    // Prediction is best effort; the explanation degrades gracefully
    let prediction = query::predict_row(&state.registry, row).ok();

    let prompt = build_specific_prompt(&entry, prediction.as_ref());
    let text = state.gemini.explain(&prompt).await.map_err(ServerError::Core)?;
    Ok(Json(json!({ "explanation": text })))
}

// ============================================================================
// Image generation handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateImageBody {
    pub kepid: Option<i64>,
    pub kepoi_name: Option<String>,
    pub prompt_extra: Option<String>,
}

/// Render a planet image from its catalog properties.
pub async fn generate_planet_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateImageBody>,
) -> Result<Json<serde_json::Value>> {
    let generation = state
        .registry
        .current()
        .ok_or(ServerError::Core(ExoError::ModelNotTrained))?;
    let df = &generation.dataset;

    let row = if let Some(kepid) = body.kepid {
        query::find_rows_by_kepid(df, kepid)
            .map_err(ServerError::Core)?
            .into_iter()
            .next()
    } else if let Some(ref kepoi_name) = body.kepoi_name {
        query::find_row_by_kepoi(df, kepoi_name).map_err(ServerError::Core)?
    } else {
        return Err(ServerError::BadRequest(
            "Provide 'kepid' or 'kepoi_name' in body".to_string(),
        ));
    };

    let row = row.ok_or_else(|| {
        ServerError::Core(ExoError::NotFound("no matching planet found".to_string()))
    })?;

    let entry = query::general_entry_at(df, row);
    let prompt = build_planet_prompt(&entry, body.prompt_extra.as_deref());
    let save_name = entry
        .kepoi_name
        .clone()
        .or_else(|| entry.name.clone())
        .unwrap_or_else(|| format!("planet_{}", chrono::Utc::now().timestamp()));

    let path = state
        .imagegen
        .generate(&prompt, &save_name)
        .await
        .map_err(ServerError::Core)?;
    Ok(Json(json!({ "path": path })))
}

/// Serve a previously generated planet image.
pub async fn exoplanet_image(
    State(state): State<Arc<AppState>>,
    Path(kepoi_name): Path<String>,
) -> Result<Response> {
    let path = state.imagegen.find_image(&kepoi_name).await.ok_or_else(|| {
        ServerError::Core(ExoError::NotFound(format!(
            "image not found for {}",
            kepoi_name
        )))
    })?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ServerError::Core(e.into()))?;
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
