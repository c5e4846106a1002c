use axum::{extract::Path, http::StatusCode, Json};
use contracts::dashboards::d400_returns_console::{
    ActionSummary, PriorityActionRequest, RecordsActionRequest, SelectionUpdate,
    SellerActionRequest, SessionCreated, SessionSnapshot,
};
use contracts::domain::a001_marketplace_return::ReturnTexts;
use contracts::shared::notification::Notification;
use contracts::shared::return_filters::{FilterCriteria, ViewSettings};
use contracts::usecases::u501_enrich_returns::{
    ActionResult, AdvancedActionRequest, AdvancedMetrics, BatchEnrichRequest, EnrichCounts,
    EnrichRequest, EnrichmentState, UpdatedCount,
};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::dashboards::d400_returns_console::{ReturnsSession, SessionRegistry};
use crate::domain::a001_marketplace_return::service;

static REGISTRY: OnceCell<Arc<SessionRegistry>> = OnceCell::new();

/// Зарегистрировать реестр сессий (один раз при старте)
pub fn install(registry: Arc<SessionRegistry>) -> anyhow::Result<()> {
    REGISTRY
        .set(registry)
        .map_err(|_| anyhow::anyhow!("Session registry is already installed"))
}

fn registry() -> Result<&'static Arc<SessionRegistry>, StatusCode> {
    REGISTRY.get().ok_or_else(|| {
        tracing::error!("Session registry is not installed");
        StatusCode::SERVICE_UNAVAILABLE
    })
}

fn session(session_id: &str) -> Result<Arc<ReturnsSession>, StatusCode> {
    registry()?.get(session_id).ok_or(StatusCode::NOT_FOUND)
}

/// POST /api/returns/sessions
pub async fn create_session() -> Result<Json<SessionCreated>, StatusCode> {
    match registry()?.create().await {
        Ok(session) => Ok(Json(SessionCreated {
            session_id: session.id().to_string(),
            filters: session.filters(),
        })),
        Err(e) => {
            tracing::error!("Failed to open returns session: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// DELETE /api/returns/sessions/:id
pub async fn delete_session(Path(session_id): Path<String>) -> StatusCode {
    match registry() {
        Ok(registry) if registry.remove(&session_id) => StatusCode::NO_CONTENT,
        Ok(_) => StatusCode::NOT_FOUND,
        Err(status) => status,
    }
}

/// GET /api/returns/sessions/:id
pub async fn get_session(Path(session_id): Path<String>) -> Result<Json<SessionSnapshot>, StatusCode> {
    Ok(Json(session(&session_id)?.snapshot()))
}

/// PUT /api/returns/sessions/:id/filters
pub async fn update_filters(
    Path(session_id): Path<String>,
    Json(filters): Json<FilterCriteria>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let session = session(&session_id)?;
    session.update_filters(filters).await;
    Ok(Json(session.snapshot()))
}

/// PUT /api/returns/sessions/:id/view
pub async fn update_view(
    Path(session_id): Path<String>,
    Json(view): Json<ViewSettings>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let session = session(&session_id)?;
    session.update_view(view).await;
    Ok(Json(session.snapshot()))
}

/// PUT /api/returns/sessions/:id/selection
pub async fn update_selection(
    Path(session_id): Path<String>,
    Json(update): Json<SelectionUpdate>,
) -> Result<Json<Vec<String>>, StatusCode> {
    Ok(Json(session(&session_id)?.update_selection(update)))
}

/// POST /api/returns/sessions/:id/enrich
pub async fn enrich(
    Path(session_id): Path<String>,
    Json(request): Json<EnrichRequest>,
) -> Result<Json<ActionResult<EnrichCounts>>, StatusCode> {
    let session = session(&session_id)?;
    Ok(Json(session.enrich(&request.account_id, request.limit).await))
}

/// POST /api/returns/sessions/:id/batch-enrich
///
/// Прогон идет в фоне; прогресс доступен в снимке сессии.
pub async fn batch_enrich(
    Path(session_id): Path<String>,
    Json(request): Json<BatchEnrichRequest>,
) -> Result<Json<EnrichmentState>, StatusCode> {
    let session = session(&session_id)?;
    Ok(Json(session.start_batch_enrich(
        request.account_id,
        request.total_records,
        request.batch_size,
    )))
}

/// POST /api/returns/sessions/:id/sync-advanced-fields
pub async fn sync_advanced_fields(
    Path(session_id): Path<String>,
    Json(request): Json<AdvancedActionRequest>,
) -> Result<Json<ActionResult<UpdatedCount>>, StatusCode> {
    let session = session(&session_id)?;
    Ok(Json(session.sync_advanced_fields(&request).await))
}

/// POST /api/returns/sessions/:id/advanced-metrics
pub async fn advanced_metrics(
    Path(session_id): Path<String>,
    Json(request): Json<AdvancedActionRequest>,
) -> Result<Json<ActionResult<AdvancedMetrics>>, StatusCode> {
    let session = session(&session_id)?;
    Ok(Json(session.fetch_advanced_metrics(&request).await))
}

/// POST /api/returns/sessions/:id/phase2-columns
pub async fn phase2_columns(
    Path(session_id): Path<String>,
    Json(request): Json<AdvancedActionRequest>,
) -> Result<Json<ActionResult<UpdatedCount>>, StatusCode> {
    let session = session(&session_id)?;
    Ok(Json(session.update_phase2_columns(&request).await))
}

/// POST /api/returns/sessions/:id/actions/mark-read
pub async fn mark_read(
    Path(session_id): Path<String>,
    Json(request): Json<RecordsActionRequest>,
) -> Result<Json<ActionResult<ActionSummary>>, StatusCode> {
    let session = session(&session_id)?;
    Ok(Json(session.mark_read(request.ids).await))
}

/// POST /api/returns/sessions/:id/actions/priority
pub async fn set_priority(
    Path(session_id): Path<String>,
    Json(request): Json<PriorityActionRequest>,
) -> Result<Json<ActionResult<ActionSummary>>, StatusCode> {
    let session = session(&session_id)?;
    Ok(Json(session.set_priority(request.ids, request.priority).await))
}

/// POST /api/returns/sessions/:id/actions/seller-action
pub async fn set_seller_action(
    Path(session_id): Path<String>,
    Json(request): Json<SellerActionRequest>,
) -> Result<Json<ActionResult<ActionSummary>>, StatusCode> {
    let session = session(&session_id)?;
    Ok(Json(
        session
            .set_seller_action_required(request.ids, request.required)
            .await,
    ))
}

/// GET /api/returns/sessions/:id/notifications
pub async fn notifications(Path(session_id): Path<String>) -> Result<Json<Vec<Notification>>, StatusCode> {
    Ok(Json(session(&session_id)?.drain_notifications()))
}

/// GET /api/returns/records/:id/text
pub async fn record_texts(Path(record_id): Path<String>) -> Result<Json<ReturnTexts>, StatusCode> {
    let store = registry()?.store();
    match service::get_texts(store.as_ref(), &record_id).await {
        Ok(Some(texts)) => Ok(Json(texts)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to load return {}: {}", record_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
