use chrono::Utc;
use contracts::usecases::u501_enrich_returns::{
    EnrichmentJob, EnrichmentOutcome, EnrichmentReport, EnrichmentState, EnrichmentStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dashboards::d400_returns_console::metrics::round2;

/// Трекер прогонов обогащения по аккаунтам (in-memory, для real-time мониторинга).
/// Одновременно по аккаунту может идти только один прогон.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    accounts: Arc<RwLock<HashMap<String, EnrichmentState>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, EnrichmentState>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, EnrichmentState>> {
        self.accounts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Начать прогон. false, если по аккаунту уже идет другой.
    pub fn try_start(&self, job: EnrichmentJob) -> bool {
        let mut accounts = self.write();
        let state = accounts.entry(job.account_id.clone()).or_default();
        if state.status == EnrichmentStatus::Running {
            return false;
        }
        state.status = EnrichmentStatus::Running;
        state.job = Some(job);
        true
    }

    pub fn is_running(&self, account_id: &str) -> bool {
        self.read()
            .get(account_id)
            .map(|s| s.status == EnrichmentStatus::Running)
            .unwrap_or(false)
    }

    /// Учесть завершенный пакет и пересчитать прогресс
    pub fn record_batch(
        &self,
        account_id: &str,
        succeeded: bool,
        enriched: u64,
        processed: u64,
    ) -> Option<EnrichmentJob> {
        let mut accounts = self.write();
        let job = accounts.get_mut(account_id)?.job.as_mut()?;
        job.batches_done += 1;
        if succeeded {
            job.records_enriched += enriched;
            job.records_processed += processed;
        } else {
            job.batches_failed += 1;
        }
        job.progress = if job.batches_total == 0 {
            100.0
        } else {
            round2(job.batches_done as f64 / job.batches_total as f64 * 100.0).min(100.0)
        };
        Some(job.clone())
    }

    pub fn current_job(&self, account_id: &str) -> Option<EnrichmentJob> {
        self.read().get(account_id).and_then(|s| s.job.clone())
    }

    /// Завершить прогон: job удаляется, остается только отчет
    pub fn finish(&self, report: EnrichmentReport) {
        let mut accounts = self.write();
        let state = accounts.entry(report.account_id.clone()).or_default();
        state.status = report.status();
        state.job = None;
        state.last_report = Some(report);
    }

    /// Прервать текущий прогон аккаунта, сохранив накопленные счетчики
    pub fn abort(&self, account_id: &str, reason: &str) -> Option<EnrichmentReport> {
        let job = self.current_job(account_id)?;
        let report = EnrichmentReport {
            account_id: job.account_id.clone(),
            batches_total: job.batches_total,
            batches_done: job.batches_done,
            batches_failed: job.batches_failed,
            records_enriched: job.records_enriched,
            records_processed: job.records_processed,
            progress: job.progress,
            outcome: EnrichmentOutcome::Aborted {
                reason: reason.to_string(),
            },
            errors: Vec::new(),
            started_at: job.started_at,
            completed_at: Utc::now(),
        };
        self.finish(report.clone());
        Some(report)
    }

    pub fn get(&self, account_id: &str) -> EnrichmentState {
        self.read().get(account_id).cloned().unwrap_or_default()
    }

    /// Состояние для набора аккаунтов: идущий прогон, иначе последний отчет
    pub fn state_for(&self, account_ids: &[String]) -> EnrichmentState {
        let accounts = self.read();
        let states: Vec<&EnrichmentState> = account_ids
            .iter()
            .filter_map(|id| accounts.get(id))
            .collect();

        if let Some(running) = states
            .iter()
            .find(|s| s.status == EnrichmentStatus::Running)
        {
            return (*running).clone();
        }
        states
            .into_iter()
            .filter(|s| s.last_report.is_some())
            .max_by_key(|s| s.last_report.as_ref().map(|r| r.completed_at))
            .cloned()
            .unwrap_or_default()
    }
}
