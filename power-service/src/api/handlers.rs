use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Query, State,
    },
    Json,
};

use super::{types::UploadResponse, AppState};
use crate::{
    error::{ServiceError, ValidationError},
    query::{query_readings, QueryRequest, QueryResponse},
    sizing::{CapacityRequest, CapacityResult},
};

fn malformed(e: MultipartError) -> ValidationError {
    ValidationError::MalformedRequest(e.body_text())
}

/// Accepts a `file` and a `company` form field and queues the file. The
/// response is sent before the file is read.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<UploadResponse>, ServiceError> {
    metrics::counter!("http_upload_requests_total").increment(1);

    let mut company = None;
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "company" => company = Some(field.text().await.map_err(malformed)?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                file = Some((file_name, bytes.to_vec()));
            }
            other => tracing::debug!(field = %other, "ignoring unknown upload field"),
        }
    }

    let company = company.ok_or(ValidationError::MissingField("company"))?;
    let (file_name, bytes) = file.ok_or(ValidationError::MissingField("file"))?;
    let size = bytes.len();

    let job_id = state.ingest.submit(company.as_str(), file_name.as_str(), bytes)?;
    tracing::info!(job_id, company = %company, file = %file_name, bytes = size, "upload accepted");

    Ok(Json(UploadResponse {
        message: "File uploaded successfully, processing in background".to_string(),
        job_id,
    }))
}

pub async fn query(
    State(state): State<AppState>,
    req: Result<Query<QueryRequest>, QueryRejection>,
) -> Result<Json<QueryResponse>, ServiceError> {
    let Query(req) = req.map_err(|e| ValidationError::MalformedRequest(e.body_text()))?;
    let resp = query_readings(state.store.as_ref(), &req, state.offset).await?;
    Ok(Json(resp))
}

pub async fn capacity(
    State(state): State<AppState>,
    req: Result<Json<CapacityRequest>, JsonRejection>,
) -> Result<Json<CapacityResult>, ServiceError> {
    let Json(req) = req.map_err(|e| ValidationError::MalformedRequest(e.body_text()))?;
    let result = state.calculator.calculate(&req).await?;
    Ok(Json(result))
}
