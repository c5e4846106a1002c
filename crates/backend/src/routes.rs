use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;

/// Конфигурация всех роутов приложения
pub fn configure_routes() -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // ========================================
        // D400 Returns console sessions
        // ========================================
        .route(
            "/api/returns/sessions",
            post(handlers::d400_returns_console::create_session),
        )
        .route(
            "/api/returns/sessions/:id",
            get(handlers::d400_returns_console::get_session)
                .delete(handlers::d400_returns_console::delete_session),
        )
        .route(
            "/api/returns/sessions/:id/filters",
            put(handlers::d400_returns_console::update_filters),
        )
        .route(
            "/api/returns/sessions/:id/view",
            put(handlers::d400_returns_console::update_view),
        )
        .route(
            "/api/returns/sessions/:id/selection",
            put(handlers::d400_returns_console::update_selection),
        )
        .route(
            "/api/returns/sessions/:id/notifications",
            get(handlers::d400_returns_console::notifications),
        )
        // UseCase u501: enrichment
        .route(
            "/api/returns/sessions/:id/enrich",
            post(handlers::d400_returns_console::enrich),
        )
        .route(
            "/api/returns/sessions/:id/batch-enrich",
            post(handlers::d400_returns_console::batch_enrich),
        )
        .route(
            "/api/returns/sessions/:id/sync-advanced-fields",
            post(handlers::d400_returns_console::sync_advanced_fields),
        )
        .route(
            "/api/returns/sessions/:id/advanced-metrics",
            post(handlers::d400_returns_console::advanced_metrics),
        )
        .route(
            "/api/returns/sessions/:id/phase2-columns",
            post(handlers::d400_returns_console::phase2_columns),
        )
        // User actions
        .route(
            "/api/returns/sessions/:id/actions/mark-read",
            post(handlers::d400_returns_console::mark_read),
        )
        .route(
            "/api/returns/sessions/:id/actions/priority",
            post(handlers::d400_returns_console::set_priority),
        )
        .route(
            "/api/returns/sessions/:id/actions/seller-action",
            post(handlers::d400_returns_console::set_seller_action),
        )
        // A001 Marketplace returns
        .route(
            "/api/returns/records/:id/text",
            get(handlers::d400_returns_console::record_texts),
        )
        // Logs handlers
        .route(
            "/api/logs",
            get(handlers::logs::list_all).delete(handlers::logs::clear_all),
        )
}
