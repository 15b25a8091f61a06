//! Error types for the server

use crate::error::ExoError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] ExoError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Core(err) => match err {
                // Untrained is a client-visible precondition, not a fault
                ExoError::ModelNotTrained => (StatusCode::BAD_REQUEST, err.to_string()),
                ExoError::NotFound(_) | ExoError::DatasetNotFound(_) => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                ExoError::Integration(msg) => {
                    tracing::error!(detail = %msg, "Integration failure");
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                }
                other => {
                    tracing::error!(detail = %other, "Internal server error");
                    (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
                }
            },
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untrained_maps_to_400() {
        let response = ServerError::Core(ExoError::ModelNotTrained).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response =
            ServerError::Core(ExoError::NotFound("no KOI with kepid 9".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_training_maps_to_500() {
        let response =
            ServerError::Core(ExoError::Training("fit failed".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
