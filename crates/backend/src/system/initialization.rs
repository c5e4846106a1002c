use std::sync::Arc;

use crate::dashboards::d400_returns_console::{ConsoleSettings, SessionRegistry};
use crate::domain::a001_marketplace_return::store::SeaOrmReturnStore;
use crate::shared::config::Config;
use crate::usecases::u501_enrich_returns::enrichment_client::HttpEnrichmentClient;
use crate::usecases::u501_enrich_returns::throttle::TokioSleeper;
use crate::usecases::u501_enrich_returns::{EnrichmentDeps, EnrichmentSettings, ProgressTracker};

/// Собрать реестр сессий консоли возвратов с production-зависимостями
pub fn build_session_registry(config: &Config) -> anyhow::Result<Arc<SessionRegistry>> {
    let client = HttpEnrichmentClient::new(&config.enrichment)?;
    tracing::info!(
        "Enrichment endpoint: {} (timeout {}s, batch size {}, auth: {})",
        config.enrichment.endpoint_url,
        config.enrichment.timeout_secs,
        config.enrichment.batch_size,
        if config.enrichment.api_key.is_some() {
            "bearer"
        } else {
            "none"
        }
    );

    let deps = EnrichmentDeps {
        client: Arc::new(client),
        store: Arc::new(SeaOrmReturnStore),
        tracker: Arc::new(ProgressTracker::new()),
        sleeper: Arc::new(TokioSleeper),
        settings: EnrichmentSettings::from(&config.enrichment),
    };
    Ok(Arc::new(SessionRegistry::new(
        deps,
        ConsoleSettings::from(config),
    )))
}
