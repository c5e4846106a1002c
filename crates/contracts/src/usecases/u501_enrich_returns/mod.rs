pub mod progress;
pub mod request;
pub mod response;

pub use progress::{
    BatchError, EnrichmentJob, EnrichmentOutcome, EnrichmentReport, EnrichmentState,
    EnrichmentStatus,
};
pub use request::{
    AdvancedActionRequest, BatchEnrichRequest, EnrichRequest, EnrichmentAction,
    EnrichmentEnvelope,
};
pub use response::{
    ActionResult, AdvancedMetrics, EnrichCounts, EnrichmentResponse, UpdatedCount,
};

use crate::usecases::common::UseCaseMetadata;

pub struct EnrichReturns;

impl UseCaseMetadata for EnrichReturns {
    fn usecase_index() -> &'static str {
        "u501"
    }

    fn usecase_name() -> &'static str {
        "enrich_returns"
    }

    fn display_name() -> &'static str {
        "Enriquecimento de devoluções"
    }

    fn description() -> &'static str {
        "Пакетное заполнение производных полей возвратов через внешний сервис"
    }
}
