use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Действие внешнего сервиса обогащения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentAction {
    EnrichExistingData,
    SyncAdvancedFields,
    FetchAdvancedMetrics,
    UpdatePhase2Columns,
}

impl EnrichmentAction {
    pub fn code(&self) -> &'static str {
        match self {
            EnrichmentAction::EnrichExistingData => "enrich_existing_data",
            EnrichmentAction::SyncAdvancedFields => "sync_advanced_fields",
            EnrichmentAction::FetchAdvancedMetrics => "fetch_advanced_metrics",
            EnrichmentAction::UpdatePhase2Columns => "update_phase2_columns",
        }
    }
}

/// Конверт запроса к сервису обогащения: `{action, account_id, ...параметры}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentEnvelope {
    pub action: EnrichmentAction,
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub date_to: Option<NaiveDate>,
}

impl EnrichmentEnvelope {
    pub fn new(action: EnrichmentAction, account_id: &str) -> Self {
        Self {
            action,
            account_id: account_id.to_string(),
            limit: None,
            date_from: None,
            date_to: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_period(mut self, date_from: Option<NaiveDate>, date_to: Option<NaiveDate>) -> Self {
        self.date_from = date_from;
        self.date_to = date_to;
        self
    }
}

/// Разовое обогащение до `limit` записей аккаунта
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichRequest {
    pub account_id: String,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Пакетное обогащение
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEnrichRequest {
    pub account_id: String,
    /// Если не задано, берется количество записей аккаунта в хранилище
    #[serde(default)]
    pub total_records: Option<u64>,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

/// Параметры узких действий (sync / metrics / phase2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedActionRequest {
    pub account_id: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}
