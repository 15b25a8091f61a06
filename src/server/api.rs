//! API route definitions

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Check /health for API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed.",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let app = Router::new()
        // Prediction and listings
        .route("/predict/:kepid", get(handlers::predict))
        .route("/planets", get(handlers::planets))
        .route("/GeneralData", get(handlers::general_data))
        .route("/planet/kepoi/:kepoi_name", get(handlers::planet_by_kepoi))
        // Configuration
        .route("/config/hyperparams", post(handlers::set_hyperparams))
        .route("/config/path", post(handlers::set_path))
        // Upload and CSV management
        .route("/upload_csv", post(handlers::upload_csv))
        .route("/csvs", get(handlers::list_csvs))
        .route("/csvs/select", post(handlers::select_csv))
        .route("/csvs/select/:filename", post(handlers::select_csv_by_name))
        // Model inspection
        .route("/model_info", get(handlers::model_info))
        .route("/model_precision", get(handlers::model_precision))
        .route("/health", get(handlers::health))
        // Explanations; the /Gemini/* spellings are kept for clients of the
        // original backend
        .route("/explain/general", get(handlers::explain_general))
        .route("/explain/planet/:kepoi_name", get(handlers::explain_planet))
        .route("/Gemini/ExplainGeneral", get(handlers::explain_general))
        .route(
            "/Gemini/ExplainSpecific/:kepoi_name",
            get(handlers::explain_planet),
        )
        // Image generation
        .route("/GeneratePlanetImage", post(handlers::generate_planet_image))
        .route("/ExoplanetImage/:kepoi_name", get(handlers::exoplanet_image))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
