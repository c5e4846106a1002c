use chrono::Utc;
use contracts::shared::notification::Notification;
use contracts::usecases::common::UseCaseMetadata;
use contracts::usecases::u501_enrich_returns::{
    ActionResult, AdvancedActionRequest, AdvancedMetrics, BatchError, EnrichCounts,
    EnrichReturns, EnrichmentAction, EnrichmentEnvelope, EnrichmentJob, EnrichmentOutcome,
    EnrichmentReport, EnrichmentResponse, UpdatedCount,
};
use std::sync::Arc;
use std::time::Duration;

use super::enrichment_client::{EnrichmentClient, EnrichmentError};
use super::progress_tracker::ProgressTracker;
use super::throttle::Sleeper;
use crate::domain::a001_marketplace_return::cache::RecordCache;
use crate::domain::a001_marketplace_return::store::ReturnStore;
use crate::shared::config::EnrichmentConfig;
use crate::shared::notifier::Notifier;

const CATEGORY: &str = "enrichment";

#[derive(Debug, Clone, Copy)]
pub struct EnrichmentSettings {
    pub batch_size: u32,
    pub batch_delay: Duration,
    pub auto_enrich_limit: u32,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            batch_size: 25,
            batch_delay: Duration::from_secs(1),
            auto_enrich_limit: 10,
        }
    }
}

impl From<&EnrichmentConfig> for EnrichmentSettings {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: config.batch_delay(),
            auto_enrich_limit: config.auto_enrich_limit,
        }
    }
}

/// Общие для всех сессий зависимости оркестратора
#[derive(Clone)]
pub struct EnrichmentDeps {
    pub client: Arc<dyn EnrichmentClient>,
    pub store: Arc<dyn ReturnStore>,
    pub tracker: Arc<ProgressTracker>,
    pub sleeper: Arc<dyn Sleeper>,
    pub settings: EnrichmentSettings,
}

/// Прогон, который не дошел до `finish`, при удалении помечается прерванным
struct RunGuard<'a> {
    tracker: &'a ProgressTracker,
    notifier: &'a dyn Notifier,
    account_id: String,
    finished: bool,
}

impl RunGuard<'_> {
    fn finish(mut self, report: EnrichmentReport) {
        self.finished = true;
        self.tracker.finish(report);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Enrichment run for {} was cancelled", self.account_id);
            self.tracker.abort(&self.account_id, "cancelado");
            self.notifier.notify(Notification::warning(
                CATEGORY,
                format!("Enriquecimento cancelado para a conta {}", self.account_id),
            ));
        }
    }
}

/// Executor для UseCase обогащения возвратов.
///
/// Каждая операция возвращает данные, а не ошибку, и отправляет ровно одно
/// уведомление. Успешное изменение данных сбрасывает кеш сессии до уведомления.
#[derive(Clone)]
pub struct EnrichmentExecutor {
    deps: EnrichmentDeps,
    cache: Arc<RecordCache>,
    notifier: Arc<dyn Notifier>,
}

impl EnrichmentExecutor {
    pub fn new(deps: EnrichmentDeps, cache: Arc<RecordCache>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            deps,
            cache,
            notifier,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.deps.tracker
    }

    pub fn settings(&self) -> EnrichmentSettings {
        self.deps.settings
    }

    fn begin(&self, job: EnrichmentJob) -> Option<RunGuard<'_>> {
        let account_id = job.account_id.clone();
        if !self.deps.tracker.try_start(job) {
            return None;
        }
        Some(RunGuard {
            tracker: &self.deps.tracker,
            notifier: self.notifier.as_ref(),
            account_id,
            finished: false,
        })
    }

    fn mutated(&self) {
        let generation = self.cache.invalidate();
        tracing::debug!("Record cache invalidated, generation {}", generation);
    }

    fn fail<T>(&self, message: String) -> ActionResult<T> {
        self.notifier.notify(Notification::error(CATEGORY, message.clone()));
        ActionResult::failed(message)
    }

    /// Разовое обогащение до `limit` записей аккаунта
    pub async fn enrich(&self, account_id: &str, limit: Option<u32>) -> ActionResult<EnrichCounts> {
        let account_id = account_id.trim();
        if account_id.is_empty() {
            return self.fail("Conta não informada para enriquecimento".to_string());
        }
        let limit = limit.unwrap_or(self.deps.settings.batch_size);
        if limit == 0 {
            return self.fail("Limite de enriquecimento deve ser maior que zero".to_string());
        }

        let Some(guard) = self.begin(EnrichmentJob::new(account_id, limit, 1)) else {
            let message = format!("Enriquecimento já em andamento para a conta {}", account_id);
            self.notifier.notify(Notification::warning(CATEGORY, message.clone()));
            return ActionResult::failed(message);
        };

        tracing::info!(
            "{}: enrich account={} limit={}",
            EnrichReturns::full_name(),
            account_id,
            limit
        );
        let started_at = Utc::now();
        let envelope =
            EnrichmentEnvelope::new(EnrichmentAction::EnrichExistingData, account_id).with_limit(limit);
        let result = self.deps.client.call(&envelope).await;

        let (counts, error) = match &result {
            Ok(response) => (Some(counts_of(response)), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let job = self.deps.tracker.record_batch(
            account_id,
            counts.is_some(),
            counts.map(|c| c.enriched_count).unwrap_or(0),
            counts.map(|c| c.processed_count).unwrap_or(0),
        );
        let mut report = report_from_job(job, account_id, 1, started_at);
        report.progress = 100.0;
        report.outcome = if error.is_some() {
            EnrichmentOutcome::CompletedWithFailures { failed_batches: 1 }
        } else {
            EnrichmentOutcome::Succeeded
        };
        if let Some(message) = &error {
            report.errors.push(BatchError {
                batch_number: 1,
                message: message.clone(),
            });
        }
        guard.finish(report);

        match (counts, error) {
            (Some(counts), _) => {
                self.mutated();
                self.notifier.notify(Notification::success(
                    CATEGORY,
                    format!(
                        "Enriquecimento concluído: {} de {} registros",
                        counts.enriched_count, counts.processed_count
                    ),
                ));
                ActionResult::ok(counts)
            }
            (None, error) => {
                let reason = error.unwrap_or_else(|| "erro desconhecido".to_string());
                tracing::error!("Enrichment failed for {}: {}", account_id, reason);
                self.fail(format!("Falha no enriquecimento: {}", reason))
            }
        }
    }

    /// Пакетное обогащение: пакеты по очереди, пауза между пакетами,
    /// ошибка пакета не останавливает прогон
    pub async fn batch_enrich(
        &self,
        account_id: &str,
        total_records: Option<u64>,
        batch_size: Option<u32>,
    ) -> EnrichmentReport {
        let account_id = account_id.trim();
        if account_id.is_empty() {
            return self.aborted(account_id, "conta não informada");
        }
        let batch_size = batch_size.unwrap_or(self.deps.settings.batch_size);
        if batch_size == 0 {
            return self.aborted(account_id, "tamanho de lote inválido");
        }
        let total_records = match total_records {
            Some(total) => total,
            None => match self.deps.store.count_by_account(account_id).await {
                Ok(total) => total,
                Err(e) => {
                    tracing::error!("Failed to count returns for {}: {}", account_id, e);
                    return self.aborted(account_id, &format!("falha ao contar registros: {}", e));
                }
            },
        };

        let batches_total = total_records.div_ceil(u64::from(batch_size));
        let Some(guard) = self.begin(EnrichmentJob::new(account_id, batch_size, batches_total))
        else {
            return self.aborted(account_id, "enriquecimento já em andamento para esta conta");
        };

        tracing::info!(
            "{}: batch enrich account={} total={} batch_size={} batches={}",
            EnrichReturns::full_name(),
            account_id,
            total_records,
            batch_size,
            batches_total
        );
        let started_at = Utc::now();
        let mut errors = Vec::new();
        let mut last_job = None;

        for batch_number in 1..=batches_total {
            let envelope = EnrichmentEnvelope::new(EnrichmentAction::EnrichExistingData, account_id)
                .with_limit(batch_size);
            let result = self.deps.client.call(&envelope).await;
            last_job = match result {
                Ok(response) => {
                    let counts = counts_of(&response);
                    self.deps.tracker.record_batch(
                        account_id,
                        true,
                        counts.enriched_count,
                        counts.processed_count,
                    )
                }
                Err(e) => {
                    tracing::warn!(
                        "Batch {}/{} failed for {}: {}",
                        batch_number,
                        batches_total,
                        account_id,
                        e
                    );
                    errors.push(BatchError {
                        batch_number,
                        message: e.to_string(),
                    });
                    self.deps.tracker.record_batch(account_id, false, 0, 0)
                }
            };

            if batch_number < batches_total {
                self.deps.sleeper.sleep(self.deps.settings.batch_delay).await;
            }
        }

        let mut report = report_from_job(last_job, account_id, batches_total, started_at);
        report.progress = 100.0;
        report.outcome = if errors.is_empty() {
            EnrichmentOutcome::Succeeded
        } else {
            EnrichmentOutcome::CompletedWithFailures {
                failed_batches: errors.len() as u64,
            }
        };
        report.errors = errors;
        guard.finish(report.clone());

        let failed = report.batches_failed;
        if failed < batches_total {
            self.mutated();
        }
        let notification = if batches_total == 0 {
            Notification::success(CATEGORY, "Nenhum registro para enriquecer")
        } else if failed == 0 {
            Notification::success(
                CATEGORY,
                format!(
                    "Enriquecimento em lote concluído: {} registros em {} lotes",
                    report.records_enriched, batches_total
                ),
            )
        } else if failed < batches_total {
            Notification::warning(
                CATEGORY,
                format!(
                    "Enriquecimento em lote concluído com {} de {} lotes com falha ({} registros)",
                    failed, batches_total, report.records_enriched
                ),
            )
        } else {
            Notification::error(
                CATEGORY,
                format!("Enriquecimento em lote falhou: {} lotes com erro", failed),
            )
        };
        self.notifier.notify(notification);
        report
    }

    fn aborted(&self, account_id: &str, reason: &str) -> EnrichmentReport {
        tracing::warn!("Batch enrichment aborted for '{}': {}", account_id, reason);
        self.notifier.notify(Notification::error(
            CATEGORY,
            format!("Enriquecimento em lote cancelado: {}", reason),
        ));
        EnrichmentReport::aborted(account_id, reason)
    }

    /// Автообогащение аккаунтов с неполными данными.
    /// Аккаунты с идущим прогоном пропускаются.
    pub async fn auto_enrich(&self, account_ids: &[String]) -> Vec<(String, ActionResult<EnrichCounts>)> {
        let limit = self.deps.settings.auto_enrich_limit;
        let mut results = Vec::new();
        for account_id in account_ids {
            if self.deps.tracker.is_running(account_id) {
                tracing::debug!("Auto-enrich skipped for {}: run in progress", account_id);
                continue;
            }
            let result = self.enrich(account_id, Some(limit)).await;
            results.push((account_id.clone(), result));
        }
        results
    }

    async fn single_shot(
        &self,
        action: EnrichmentAction,
        request: &AdvancedActionRequest,
    ) -> Result<EnrichmentResponse, String> {
        let account_id = request.account_id.trim();
        if account_id.is_empty() {
            return Err("conta não informada".to_string());
        }
        let mut envelope =
            EnrichmentEnvelope::new(action, account_id).with_period(request.date_from, request.date_to);
        if let Some(limit) = request.limit {
            envelope = envelope.with_limit(limit);
        }
        tracing::info!(
            "{}: {} account={}",
            EnrichReturns::full_name(),
            action.code(),
            account_id
        );
        self.deps.client.call(&envelope).await.map_err(|e: EnrichmentError| {
            tracing::error!("{} failed for {}: {}", action.code(), account_id, e);
            e.to_string()
        })
    }

    pub async fn sync_advanced_fields(&self, request: &AdvancedActionRequest) -> ActionResult<UpdatedCount> {
        match self
            .single_shot(EnrichmentAction::SyncAdvancedFields, request)
            .await
        {
            Ok(response) => {
                let updated = UpdatedCount {
                    updated_count: response.updated_count.unwrap_or(0),
                };
                self.mutated();
                self.notifier.notify(Notification::success(
                    CATEGORY,
                    format!("Campos avançados sincronizados: {} registros", updated.updated_count),
                ));
                ActionResult::ok(updated)
            }
            Err(reason) => self.fail(format!("Falha ao sincronizar campos avançados: {}", reason)),
        }
    }

    pub async fn fetch_advanced_metrics(&self, request: &AdvancedActionRequest) -> ActionResult<AdvancedMetrics> {
        match self
            .single_shot(EnrichmentAction::FetchAdvancedMetrics, request)
            .await
        {
            Ok(response) => {
                let metrics = response.metrics.unwrap_or(serde_json::Value::Null);
                self.notifier
                    .notify(Notification::success(CATEGORY, "Métricas avançadas carregadas"));
                ActionResult::ok(AdvancedMetrics { metrics })
            }
            Err(reason) => self.fail(format!("Falha ao buscar métricas avançadas: {}", reason)),
        }
    }

    pub async fn update_phase2_columns(&self, request: &AdvancedActionRequest) -> ActionResult<UpdatedCount> {
        match self
            .single_shot(EnrichmentAction::UpdatePhase2Columns, request)
            .await
        {
            Ok(response) => {
                let updated = UpdatedCount {
                    updated_count: response.updated_count.unwrap_or(0),
                };
                self.mutated();
                self.notifier.notify(Notification::success(
                    CATEGORY,
                    format!("Colunas da fase 2 atualizadas: {} registros", updated.updated_count),
                ));
                ActionResult::ok(updated)
            }
            Err(reason) => self.fail(format!("Falha ao atualizar colunas da fase 2: {}", reason)),
        }
    }
}

fn counts_of(response: &EnrichmentResponse) -> EnrichCounts {
    let enriched = response.enriched_count.unwrap_or(0);
    EnrichCounts {
        enriched_count: enriched,
        processed_count: response.processed_count.unwrap_or(enriched),
    }
}

fn report_from_job(
    job: Option<EnrichmentJob>,
    account_id: &str,
    batches_total: u64,
    started_at: chrono::DateTime<Utc>,
) -> EnrichmentReport {
    let job = job.unwrap_or_else(|| {
        let mut job = EnrichmentJob::new(account_id, 0, batches_total);
        job.started_at = started_at;
        job
    });
    EnrichmentReport {
        account_id: job.account_id,
        batches_total: job.batches_total,
        batches_done: job.batches_done,
        batches_failed: job.batches_failed,
        records_enriched: job.records_enriched,
        records_processed: job.records_processed,
        progress: job.progress,
        outcome: EnrichmentOutcome::Succeeded,
        errors: Vec::new(),
        started_at: job.started_at,
        completed_at: Utc::now(),
    }
}
