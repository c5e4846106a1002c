use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Статус прогона обогащения: Idle → Running → {Completed | Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Текущий прогон (существует только пока идет обработка)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentJob {
    pub account_id: String,
    pub batch_size: u32,
    pub batches_total: u64,
    pub batches_done: u64,
    pub batches_failed: u64,
    pub records_enriched: u64,
    pub records_processed: u64,
    /// 0..=100
    pub progress: f64,
    pub started_at: DateTime<Utc>,
}

impl EnrichmentJob {
    pub fn new(account_id: &str, batch_size: u32, batches_total: u64) -> Self {
        Self {
            account_id: account_id.to_string(),
            batch_size,
            batches_total,
            batches_done: 0,
            batches_failed: 0,
            records_enriched: 0,
            records_processed: 0,
            progress: 0.0,
            started_at: Utc::now(),
        }
    }
}

/// Итог прогона
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EnrichmentOutcome {
    /// Все пакеты успешны
    Succeeded,
    /// Прогон дошел до конца, часть пакетов с ошибкой
    CompletedWithFailures { failed_batches: u64 },
    /// Прогон не выполнялся или был прерван
    Aborted { reason: String },
}

/// Ошибка отдельного пакета
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Номер пакета с единицы
    pub batch_number: u64,
    pub message: String,
}

/// Отчет по завершенному прогону
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub account_id: String,
    pub batches_total: u64,
    pub batches_done: u64,
    pub batches_failed: u64,
    pub records_enriched: u64,
    pub records_processed: u64,
    pub progress: f64,
    pub outcome: EnrichmentOutcome,
    pub errors: Vec<BatchError>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl EnrichmentReport {
    /// Отчет о прогоне, который не начался
    pub fn aborted(account_id: &str, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            account_id: account_id.to_string(),
            batches_total: 0,
            batches_done: 0,
            batches_failed: 0,
            records_enriched: 0,
            records_processed: 0,
            progress: 0.0,
            outcome: EnrichmentOutcome::Aborted {
                reason: reason.into(),
            },
            errors: Vec::new(),
            started_at: now,
            completed_at: now,
        }
    }

    /// Failed, если прогон прерван или ни один пакет не прошел
    pub fn status(&self) -> EnrichmentStatus {
        match &self.outcome {
            EnrichmentOutcome::Aborted { .. } => EnrichmentStatus::Failed,
            EnrichmentOutcome::CompletedWithFailures { failed_batches }
                if *failed_batches >= self.batches_total =>
            {
                EnrichmentStatus::Failed
            }
            _ => EnrichmentStatus::Completed,
        }
    }
}

/// Состояние обогащения для UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentState {
    pub status: EnrichmentStatus,
    pub job: Option<EnrichmentJob>,
    pub last_report: Option<EnrichmentReport>,
}

impl Default for EnrichmentState {
    fn default() -> Self {
        Self {
            status: EnrichmentStatus::Idle,
            job: None,
            last_report: None,
        }
    }
}
