use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::{error::ServiceError, store::ReadingStore, timestamp};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub start_time: String,
    pub end_time: String,
    pub company: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerPoint {
    pub time: String,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResponse {
    pub data: Vec<PowerPoint>,
}

/// Stored readings of one company in an inclusive window, oldest first.
pub async fn query_readings<S>(store: &S, req: &QueryRequest, offset: UtcOffset) -> Result<QueryResponse, ServiceError>
where
    S: ReadingStore + ?Sized,
{
    let start = timestamp::parse_request(&req.start_time, offset)?;
    let end = timestamp::parse_request(&req.end_time, offset)?;

    let readings = store.query_range(start, end, &req.company).await?;
    tracing::debug!(company = %req.company, rows = readings.len(), "range query");

    Ok(QueryResponse {
        data: readings
            .into_iter()
            .map(|r| PowerPoint {
                time: timestamp::format_local(r.ts, offset),
                power: r.power,
            })
            .collect(),
    })
}
