pub mod metrics;
pub mod session;

pub use metrics::{
    FinancialMetrics, MetricsSnapshot, RateMetrics, TimeMetrics, TrendDelta, TrendDirection,
};
pub use session::{
    ActionSummary, PriorityActionRequest, RecordsActionRequest, SelectionMode, SelectionUpdate,
    SellerActionRequest, SessionCreated, SessionSnapshot,
};
