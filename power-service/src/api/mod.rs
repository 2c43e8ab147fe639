//! HTTP surface: upload, range query and capacity sizing.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use time::UtcOffset;

use crate::{error::ServiceError, pipeline::IngestQueue, sizing::CapacityCalculator, store::ReadingStore};

pub use types::{ErrorResponse, UploadResponse};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub ingest: IngestQueue,
    pub calculator: Arc<CapacityCalculator<dyn ReadingStore>>,
    /// Offset request and response timestamps are expressed in.
    pub offset: UtcOffset,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, ingest: IngestQueue, offset: UtcOffset, round_amounts: bool) -> Self {
        let calculator = Arc::new(CapacityCalculator::new(Arc::clone(&store), offset, round_amounts));
        Self {
            store,
            ingest,
            calculator,
            offset,
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload/", post(handlers::upload))
        .route("/query/", get(handlers::query))
        .route("/capacity/", post(handlers::capacity))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Spreadsheet(_) => StatusCode::BAD_REQUEST,
            Self::QueueFull | Self::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ValidationError, store::StoreError};

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(
            ServiceError::from(ValidationError::UnsupportedMethod("x".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::QueueFull.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ServiceError::from(StoreError::Query("down".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn error_body_is_json() {
        let resp = ServiceError::from(ValidationError::MissingField("company")).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "missing form field 'company'" }));
    }
}
