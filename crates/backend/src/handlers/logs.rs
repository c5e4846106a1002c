use axum::{extract::Query, http::StatusCode, Json};
use contracts::shared::logger::LogEntry;
use serde::Deserialize;

use crate::shared::logger;

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub category: Option<String>,
    pub limit: Option<u64>,
}

/// GET /api/logs?category=&limit=
pub async fn list_all(Query(query): Query<LogQuery>) -> Result<Json<Vec<LogEntry>>, StatusCode> {
    match logger::repository::list_logs(query.category.as_deref(), query.limit).await {
        Ok(logs) => Ok(Json(logs)),
        Err(e) => {
            tracing::error!("Failed to load logs: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// DELETE /api/logs
pub async fn clear_all() -> StatusCode {
    match logger::repository::clear_all_logs().await {
        Ok(removed) => {
            tracing::info!("Cleared {} log entries", removed);
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!("Failed to clear logs: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
