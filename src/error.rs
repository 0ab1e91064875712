//! Central error taxonomy for the API surface.
//!
//! Four classes of failure leave the service: validation (caller fault,
//! no external call was made), rate-limit rejection (try again later),
//! upstream service failure (embedding/chat/transcription), and storage
//! failure. Partial ingestion carries its progress counts instead of
//! masking them as success or total failure. No failure is retried.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Rate limited. Try again shortly.")]
    RateLimited,

    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("ingested {inserted}/{total} chunks before failing: {message}")]
    PartialIngest {
        inserted: usize,
        total: usize,
        message: String,
    },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Storage(_) | ApiError::PartialIngest { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        }
        let body = match &self {
            ApiError::PartialIngest {
                inserted, total, ..
            } => json!({
                "error": self.to_string(),
                "inserted": inserted,
                "total": total,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for ApiError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Upstream(err.to_string())
    }
}
