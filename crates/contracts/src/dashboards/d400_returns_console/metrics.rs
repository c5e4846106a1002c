use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Средние значения по времени и удовлетворенности
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeMetrics {
    /// Минуты
    pub avg_response_time: f64,
    /// Минуты
    pub avg_resolution_time: f64,
    /// 0..=1
    pub avg_satisfaction: f64,
}

/// Доли в процентах, округление до 2 знаков
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateMetrics {
    pub escalation_rate: f64,
    pub mediation_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub retained_value_sum: f64,
    pub shipping_cost_sum: f64,
    pub compensation_value_sum: f64,
    /// retained + shipping + compensation, знаки как пришли из источника
    pub net_impact: f64,
}

/// Снимок метрик по текущей выборке возвратов
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_count: usize,
    pub priority_distribution: BTreeMap<String, usize>,
    pub status_distribution: BTreeMap<String, usize>,
    pub type_distribution: BTreeMap<String, usize>,
    pub time: TimeMetrics,
    pub rates: RateMetrics,
    pub high_priority_count: usize,
    pub unread_messages_count: i64,
    pub overdue_actions_count: usize,
    pub financial: FinancialMetrics,
    pub evaluated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Изменение показателя относительно предыдущего снимка
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDelta {
    pub metric: String,
    pub current: f64,
    pub previous: f64,
    /// None, если предыдущее значение равно нулю
    pub delta_percent: Option<f64>,
    pub direction: TrendDirection,
}
