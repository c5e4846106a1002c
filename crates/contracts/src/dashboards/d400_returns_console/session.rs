use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::{MetricsSnapshot, TrendDelta};
use crate::domain::a001_marketplace_return::{ReturnPriority, ReturnRecord};
use crate::shared::return_filters::{FilterCriteria, ViewSettings};
use crate::usecases::u501_enrich_returns::EnrichmentState;

/// Ответ на открытие экрана возвратов
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub filters: FilterCriteria,
}

/// Состояние экрана для слоя представления
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub filters: FilterCriteria,
    pub view: ViewSettings,
    pub page_size: u64,
    pub selection: Vec<String>,
    pub records: Vec<ReturnRecord>,
    /// Всего записей по фильтру без учета страницы
    pub total: u64,
    pub metrics: MetricsSnapshot,
    pub trends: Vec<TrendDelta>,
    pub enrichment: EnrichmentState,
    pub is_loading: bool,
    pub is_enriching: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Replace,
    Add,
    Remove,
    /// Выбрать все записи текущей страницы
    All,
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionUpdate {
    pub mode: SelectionMode,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Пакетное действие; без `ids` применяется к текущему выбору
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsActionRequest {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityActionRequest {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    pub priority: ReturnPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerActionRequest {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionSummary {
    pub affected: u64,
}
