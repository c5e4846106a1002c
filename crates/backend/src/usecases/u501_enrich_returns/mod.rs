pub mod auto_enrich;
pub mod enrichment_client;
pub mod executor;
pub mod progress_tracker;
pub mod throttle;

pub use executor::{EnrichmentDeps, EnrichmentExecutor, EnrichmentSettings};
pub use progress_tracker::ProgressTracker;
