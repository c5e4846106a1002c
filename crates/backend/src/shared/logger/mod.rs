pub mod repository;

use repository::log_event_internal;

use crate::shared::data::db;

/// Логирование события на сервере в system_log
///
/// # Примеры
/// ```ignore
/// logger::log("enrichment", "Enriquecimento concluído: 12 registros");
/// ```
pub fn log(category: &str, message: &str) {
    // До подключения к базе событие остается только в tracing
    if !db::is_initialized() {
        return;
    }
    log_event_internal("server", category, message);
}
