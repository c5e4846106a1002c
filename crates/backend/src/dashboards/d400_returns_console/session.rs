//! Состояние экрана возвратов: фильтры, представление, выбор, выборка и метрики.
//!
//! Сессия связывает компилятор фильтров, агрегатор метрик и оркестратор
//! обогащения. Фоновые задачи (отложенное автообогащение, периодическое
//! обновление, пакетный прогон) принадлежат сессии и отменяются при ее закрытии.

use chrono::{DateTime, Utc};
use contracts::dashboards::d400_returns_console::{
    ActionSummary, MetricsSnapshot, SelectionMode, SelectionUpdate, SessionSnapshot, TrendDelta,
};
use contracts::domain::a001_marketplace_return::{ReturnPriority, ReturnRecord};
use contracts::shared::notification::Notification;
use contracts::shared::return_filters::{DisplayMode, FilterCriteria, ViewSettings};
use contracts::usecases::u501_enrich_returns::{
    ActionResult, AdvancedActionRequest, AdvancedMetrics, EnrichCounts, EnrichmentReport,
    EnrichmentState, UpdatedCount,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;

use super::metrics;
use crate::domain::a001_marketplace_return::cache::RecordCache;
use crate::domain::a001_marketplace_return::service;
use crate::domain::a001_marketplace_return::store::ReturnStore;
use crate::shared::config::Config;
use crate::shared::notifier::Notifier;
use crate::usecases::u501_enrich_returns::auto_enrich;
use crate::usecases::u501_enrich_returns::{EnrichmentDeps, EnrichmentExecutor};

const ACTIONS_CATEGORY: &str = "actions";
const RECORDS_CATEGORY: &str = "records";

#[derive(Debug, Clone, Copy)]
pub struct ConsoleSettings {
    pub default_period_days: i64,
    pub card_page_size: u64,
    pub table_page_size: u64,
    /// None: без периодического обновления
    pub refresh_interval: Option<Duration>,
    pub auto_enrich_delay: Duration,
    /// None: сессии не истекают
    pub session_idle_timeout: Option<Duration>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            default_period_days: 30,
            card_page_size: 20,
            table_page_size: 50,
            refresh_interval: None,
            auto_enrich_delay: Duration::from_secs(2),
            session_idle_timeout: Some(Duration::from_secs(1800)),
        }
    }
}

impl From<&Config> for ConsoleSettings {
    fn from(config: &Config) -> Self {
        let console = &config.console;
        Self {
            default_period_days: console.default_period_days,
            card_page_size: console.card_page_size.max(1),
            table_page_size: console.table_page_size.max(1),
            refresh_interval: (console.refresh_interval_secs > 0)
                .then(|| Duration::from_secs(console.refresh_interval_secs)),
            auto_enrich_delay: config.enrichment.auto_enrich_delay(),
            session_idle_timeout: (console.session_idle_timeout_secs > 0)
                .then(|| Duration::from_secs(console.session_idle_timeout_secs)),
        }
    }
}

#[derive(Default)]
struct SessionState {
    filters: FilterCriteria,
    view: ViewSettings,
    selection: BTreeSet<String>,
    metrics: MetricsSnapshot,
    trends: Vec<TrendDelta>,
    loading: usize,
    enriching: usize,
    /// Аккаунты, для которых автообогащение уже запускалось
    auto_enriched: BTreeSet<String>,
    /// Ждут отложенной задачи автообогащения
    auto_pending: BTreeSet<String>,
    /// Отложенная задача спит и заберет `auto_pending`
    auto_scheduled: bool,
    last_report: Option<EnrichmentReport>,
}

#[derive(Default)]
struct Tasks {
    refresh: Option<AbortHandle>,
    /// Автообогащение и пакетные прогоны; завершенные удаляются при добавлении
    background: Vec<AbortHandle>,
}

impl Tasks {
    fn track(&mut self, handle: AbortHandle) {
        self.background.retain(|h| !h.is_finished());
        self.background.push(handle);
    }

    fn abort_all(&mut self) {
        for handle in self.refresh.take().into_iter().chain(self.background.drain(..)) {
            handle.abort();
        }
    }
}

/// Счетчик активных операций: уменьшается при выходе из области видимости
struct Busy<'a> {
    session: &'a ReturnsSession,
    enriching: bool,
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        let mut state = self.session.state();
        if self.enriching {
            state.enriching = state.enriching.saturating_sub(1);
        } else {
            state.loading = state.loading.saturating_sub(1);
        }
    }
}

pub struct ReturnsSession {
    id: String,
    store: Arc<dyn ReturnStore>,
    executor: EnrichmentExecutor,
    cache: Arc<RecordCache>,
    notifier: Arc<dyn Notifier>,
    settings: ConsoleSettings,
    state: Mutex<SessionState>,
    tasks: Mutex<Tasks>,
    weak_self: Weak<ReturnsSession>,
}

type BoxedRefresh = Pin<Box<dyn Future<Output = bool> + Send>>;

impl ReturnsSession {
    /// Открыть сессию: фильтры по умолчанию (последние N дней, все аккаунты)
    /// и первая загрузка
    pub async fn mount(
        id: String,
        deps: EnrichmentDeps,
        notifier: Arc<dyn Notifier>,
        settings: ConsoleSettings,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Arc<Self>> {
        let account_ids = service::list_account_ids(deps.store.as_ref()).await?;
        let filters =
            FilterCriteria::default_for(account_ids, now.date_naive(), settings.default_period_days);
        let cache = Arc::new(RecordCache::new());
        let store = deps.store.clone();
        let executor = EnrichmentExecutor::new(deps, cache.clone(), notifier.clone());

        let session = Arc::new_cyclic(|weak| Self {
            id,
            store,
            executor,
            cache,
            notifier,
            settings,
            state: Mutex::new(SessionState {
                filters,
                ..Default::default()
            }),
            tasks: Mutex::new(Tasks::default()),
            weak_self: weak.clone(),
        });

        tracing::info!(
            "Returns session {} mounted with {} accounts",
            session.id,
            session.filters().account_ids.len()
        );
        session.refresh().await;
        session.start_periodic_refresh();
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn busy(&self, enriching: bool) -> Busy<'_> {
        let mut state = self.state();
        if enriching {
            state.enriching += 1;
        } else {
            state.loading += 1;
        }
        Busy {
            session: self,
            enriching,
        }
    }

    pub fn filters(&self) -> FilterCriteria {
        self.state().filters.clone()
    }

    pub fn page_size(&self) -> u64 {
        match self.state().view.display_mode {
            DisplayMode::Cards => self.settings.card_page_size,
            DisplayMode::Table => self.settings.table_page_size,
        }
    }

    fn current_records(&self) -> Vec<ReturnRecord> {
        self.cache
            .get()
            .map(|cached| cached.page.records)
            .unwrap_or_default()
    }

    /// Перезагрузить выборку и пересчитать метрики.
    /// true, если кеш обновлен (ответ не устарел и хранилище доступно).
    pub async fn refresh(&self) -> bool {
        let _busy = self.busy(false);
        let generation = self.cache.generation();
        let (criteria, view) = {
            let state = self.state();
            (state.filters.clone(), state.view.clone())
        };
        let page_size = self.page_size();
        let now = Utc::now();

        let page = match service::search(self.store.as_ref(), &criteria, &view, page_size, now).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Session {}: failed to load returns: {}", self.id, e);
                self.notifier.notify(Notification::error(
                    RECORDS_CATEGORY,
                    format!("Falha ao carregar devoluções: {}", e),
                ));
                return false;
            }
        };

        let snapshot = metrics::compute_metrics(&page.records, now);
        let incomplete = auto_enrich::incomplete_accounts(&page.records);
        if !self.cache.store(generation, page, now) {
            return false;
        }

        let pending: Vec<String> = {
            let mut state = self.state();
            if state.metrics.evaluated_at.is_some() {
                state.trends = metrics::compare(&snapshot, &state.metrics);
            }
            state.metrics = snapshot;
            let pending: Vec<String> = incomplete
                .into_iter()
                .filter(|account| !state.auto_enriched.contains(account))
                .collect();
            state.auto_enriched.extend(pending.iter().cloned());
            pending
        };

        if !pending.is_empty() {
            self.schedule_auto_enrich(pending);
        }
        true
    }

    fn refresh_boxed(session: Arc<Self>) -> BoxedRefresh {
        Box::pin(async move { session.refresh().await })
    }

    /// Отложенное автообогащение. Аккаунты, пришедшие пока задача спит,
    /// присоединяются к ней; уже начатые вызовы не прерываются.
    fn schedule_auto_enrich(&self, accounts: Vec<String>) {
        let mut state = self.state();
        state.auto_pending.extend(accounts);
        if state.auto_scheduled {
            tracing::debug!(
                "Session {}: auto-enrich pending for {:?}",
                self.id,
                state.auto_pending
            );
            return;
        }
        state.auto_scheduled = true;

        let weak = self.weak_self.clone();
        let delay = self.settings.auto_enrich_delay;
        tracing::debug!(
            "Session {}: auto-enrich scheduled in {:?} for {:?}",
            self.id,
            delay,
            state.auto_pending
        );

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = weak.upgrade() else {
                return;
            };
            let accounts: Vec<String> = {
                let mut state = session.state();
                state.auto_scheduled = false;
                std::mem::take(&mut state.auto_pending).into_iter().collect()
            };
            let results = {
                let _busy = session.busy(true);
                session.executor.auto_enrich(&accounts).await
            };
            if results.iter().any(|(_, result)| result.success) {
                Self::refresh_boxed(session).await;
            }
        })
        .abort_handle();
        drop(state);
        self.tasks().track(handle);
    }

    fn start_periodic_refresh(&self) {
        let Some(interval) = self.settings.refresh_interval else {
            return;
        };
        let weak = self.weak_self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // первый тик срабатывает сразу
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                Self::refresh_boxed(session).await;
            }
        })
        .abort_handle();

        if let Some(previous) = self.tasks().refresh.replace(handle) {
            previous.abort();
        }
    }

    /// Новые фильтры: страница и выбор сбрасываются
    pub async fn update_filters(&self, filters: FilterCriteria) -> bool {
        {
            let mut state = self.state();
            state.filters = filters;
            state.view.page = 0;
            state.selection.clear();
            state.auto_enriched.clear();
        }
        self.cache.invalidate();
        self.refresh().await
    }

    pub async fn update_view(&self, view: ViewSettings) -> bool {
        self.state().view = view;
        self.cache.invalidate();
        self.refresh().await
    }

    /// Изменить выбор; возвращает выбранные id
    pub fn update_selection(&self, update: SelectionUpdate) -> Vec<String> {
        let page_ids: Vec<String> = match update.mode {
            SelectionMode::All => self.current_records().into_iter().map(|r| r.id).collect(),
            _ => Vec::new(),
        };
        let mut state = self.state();
        match update.mode {
            SelectionMode::Replace => state.selection = update.ids.into_iter().collect(),
            SelectionMode::Add => state.selection.extend(update.ids),
            SelectionMode::Remove => {
                for id in &update.ids {
                    state.selection.remove(id);
                }
            }
            SelectionMode::All => state.selection = page_ids.into_iter().collect(),
            SelectionMode::Clear => state.selection.clear(),
        }
        state.selection.iter().cloned().collect()
    }

    pub fn selection(&self) -> Vec<String> {
        self.state().selection.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let cached = self.cache.get();
        let state = self.state();
        let mut enrichment = self.executor.tracker().state_for(&state.filters.account_ids);
        if enrichment.last_report.is_none() {
            enrichment.last_report = state.last_report.clone();
        }
        let page_size = match state.view.display_mode {
            DisplayMode::Cards => self.settings.card_page_size,
            DisplayMode::Table => self.settings.table_page_size,
        };
        SessionSnapshot {
            session_id: self.id.clone(),
            filters: state.filters.clone(),
            view: state.view.clone(),
            page_size,
            selection: state.selection.iter().cloned().collect(),
            records: cached
                .as_ref()
                .map(|c| c.page.records.clone())
                .unwrap_or_default(),
            total: cached.as_ref().map(|c| c.page.total).unwrap_or(0),
            metrics: state.metrics.clone(),
            trends: state.trends.clone(),
            enrichment,
            is_loading: state.loading > 0,
            is_enriching: state.enriching > 0,
            fetched_at: cached.map(|c| c.fetched_at),
        }
    }

    pub fn enrichment_state(&self) -> EnrichmentState {
        let accounts = self.state().filters.account_ids.clone();
        self.executor.tracker().state_for(&accounts)
    }

    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.notifier.drain()
    }

    // ------------------------------------------------------------------
    // Обогащение
    // ------------------------------------------------------------------

    pub async fn enrich(&self, account_id: &str, limit: Option<u32>) -> ActionResult<EnrichCounts> {
        let result = {
            let _busy = self.busy(true);
            self.executor.enrich(account_id, limit).await
        };
        if result.success {
            self.refresh().await;
        }
        result
    }

    pub async fn batch_enrich(
        &self,
        account_id: &str,
        total_records: Option<u64>,
        batch_size: Option<u32>,
    ) -> EnrichmentReport {
        let report = {
            let _busy = self.busy(true);
            self.executor
                .batch_enrich(account_id, total_records, batch_size)
                .await
        };
        self.state().last_report = Some(report.clone());
        if report.records_enriched > 0 || report.batches_done > report.batches_failed {
            self.refresh().await;
        }
        report
    }

    /// Запустить пакетный прогон в фоне; задача отменяется при закрытии сессии
    pub fn start_batch_enrich(
        &self,
        account_id: String,
        total_records: Option<u64>,
        batch_size: Option<u32>,
    ) -> EnrichmentState {
        let weak = self.weak_self.clone();
        let handle = tokio::spawn(async move {
            let Some(session) = weak.upgrade() else {
                return;
            };
            session
                .batch_enrich(&account_id, total_records, batch_size)
                .await;
        })
        .abort_handle();

        self.tasks().track(handle);
        self.enrichment_state()
    }

    pub async fn sync_advanced_fields(&self, request: &AdvancedActionRequest) -> ActionResult<UpdatedCount> {
        let result = {
            let _busy = self.busy(true);
            self.executor.sync_advanced_fields(request).await
        };
        if result.success {
            self.refresh().await;
        }
        result
    }

    pub async fn fetch_advanced_metrics(&self, request: &AdvancedActionRequest) -> ActionResult<AdvancedMetrics> {
        let _busy = self.busy(true);
        self.executor.fetch_advanced_metrics(request).await
    }

    pub async fn update_phase2_columns(&self, request: &AdvancedActionRequest) -> ActionResult<UpdatedCount> {
        let result = {
            let _busy = self.busy(true);
            self.executor.update_phase2_columns(request).await
        };
        if result.success {
            self.refresh().await;
        }
        result
    }

    // ------------------------------------------------------------------
    // Действия пользователя
    // ------------------------------------------------------------------

    fn target_ids(&self, ids: Option<Vec<String>>) -> Vec<String> {
        ids.unwrap_or_else(|| self.selection())
    }

    /// Общая обработка результата действия: сброс кеша, уведомление, обновление
    async fn finish_action(
        &self,
        result: anyhow::Result<u64>,
        success_message: impl FnOnce(u64) -> String,
        failure_message: &str,
    ) -> ActionResult<ActionSummary> {
        match result {
            Ok(affected) => {
                if affected > 0 {
                    self.cache.invalidate();
                }
                self.notifier.notify(Notification::success(
                    ACTIONS_CATEGORY,
                    success_message(affected),
                ));
                if affected > 0 {
                    self.refresh().await;
                }
                ActionResult::ok(ActionSummary { affected })
            }
            Err(e) => {
                tracing::error!("Session {}: {}: {}", self.id, failure_message, e);
                let message = format!("{}: {}", failure_message, e);
                self.notifier
                    .notify(Notification::error(ACTIONS_CATEGORY, message.clone()));
                ActionResult::failed(message)
            }
        }
    }

    fn nothing_selected(&self) -> ActionResult<ActionSummary> {
        let message = "Nenhuma devolução selecionada";
        self.notifier
            .notify(Notification::warning(ACTIONS_CATEGORY, message));
        ActionResult::failed(message)
    }

    pub async fn mark_read(&self, ids: Option<Vec<String>>) -> ActionResult<ActionSummary> {
        let ids = self.target_ids(ids);
        if ids.is_empty() {
            return self.nothing_selected();
        }
        let result = service::mark_read(self.store.as_ref(), &ids).await;
        self.finish_action(
            result,
            |n| format!("{} devoluções marcadas como lidas", n),
            "Falha ao marcar como lidas",
        )
        .await
    }

    pub async fn set_priority(
        &self,
        ids: Option<Vec<String>>,
        priority: ReturnPriority,
    ) -> ActionResult<ActionSummary> {
        let ids = self.target_ids(ids);
        if ids.is_empty() {
            return self.nothing_selected();
        }
        let result = service::set_priority(self.store.as_ref(), &ids, priority).await;
        self.finish_action(
            result,
            |n| format!("Prioridade {} aplicada a {} devoluções", priority.code(), n),
            "Falha ao alterar prioridade",
        )
        .await
    }

    pub async fn set_seller_action_required(
        &self,
        ids: Option<Vec<String>>,
        required: bool,
    ) -> ActionResult<ActionSummary> {
        let ids = self.target_ids(ids);
        if ids.is_empty() {
            return self.nothing_selected();
        }
        let result = service::set_seller_action_required(self.store.as_ref(), &ids, required).await;
        self.finish_action(
            result,
            |n| {
                if required {
                    format!("{} devoluções marcadas como ação do vendedor", n)
                } else {
                    format!("Ação do vendedor removida de {} devoluções", n)
                }
            },
            "Falha ao alterar ação do vendedor",
        )
        .await
    }

    /// Закрыть сессию: отменить все фоновые задачи
    pub fn teardown(&self) {
        self.tasks().abort_all();
        tracing::info!("Returns session {} closed", self.id);
    }
}

impl Drop for ReturnsSession {
    fn drop(&mut self) {
        self.tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::a001_marketplace_return::store::test_support::MemoryReturnStore;
    use crate::shared::notifier::test_support::RecordingNotifier;
    use crate::usecases::u501_enrich_returns::enrichment_client::test_support::{
        enriched, ScriptedClient,
    };
    use crate::usecases::u501_enrich_returns::enrichment_client::EnrichmentError;
    use crate::usecases::u501_enrich_returns::throttle::test_support::RecordingSleeper;
    use crate::usecases::u501_enrich_returns::{EnrichmentSettings, ProgressTracker};
    use contracts::shared::notification::NotificationLevel;
    use contracts::usecases::u501_enrich_returns::{EnrichmentAction, EnrichmentResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Клиент сервиса с задержкой ответа; считает вызовы
    #[derive(Default)]
    struct SlowClient {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl crate::usecases::u501_enrich_returns::enrichment_client::EnrichmentClient for SlowClient {
        async fn call(
            &self,
            _envelope: &contracts::usecases::u501_enrich_returns::EnrichmentEnvelope,
        ) -> Result<EnrichmentResponse, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            enriched(1)
        }
    }

    fn complete(id: &str, account: &str) -> ReturnRecord {
        let mut r = ReturnRecord::new(id, account, Utc::now());
        r.priority = Some(ReturnPriority::Medium);
        r.attachments_count = Some(1);
        r.messages_data = Some(json!([{"text": "olá"}]));
        r.unread_messages = Some(2);
        r
    }

    struct Fixture {
        store: Arc<MemoryReturnStore>,
        client: Arc<ScriptedClient>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        fn new(
            records: Vec<ReturnRecord>,
            responses: Vec<Result<EnrichmentResponse, EnrichmentError>>,
        ) -> Self {
            Self {
                store: Arc::new(MemoryReturnStore::with_records(records)),
                client: Arc::new(ScriptedClient::new(responses)),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        async fn mount(&self, settings: ConsoleSettings) -> Arc<ReturnsSession> {
            let deps = EnrichmentDeps {
                client: self.client.clone(),
                store: self.store.clone(),
                tracker: Arc::new(ProgressTracker::new()),
                sleeper: Arc::new(RecordingSleeper::default()),
                settings: EnrichmentSettings::default(),
            };
            ReturnsSession::mount(
                "s-1".into(),
                deps,
                self.notifier.clone(),
                settings,
                Utc::now(),
            )
            .await
            .unwrap()
        }
    }

    fn quick() -> ConsoleSettings {
        ConsoleSettings {
            auto_enrich_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mount_uses_defaults_and_loads() {
        let fx = Fixture::new(vec![complete("a", "acc-1"), complete("b", "acc-2")], vec![]);
        let session = fx.mount(quick()).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.filters.account_ids, vec!["acc-1", "acc-2"]);
        let today = Utc::now().date_naive();
        assert_eq!(snapshot.filters.date_to, Some(today));
        assert_eq!(
            snapshot.filters.date_from,
            Some(today - chrono::Duration::days(30))
        );
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.metrics.total_count, 2);
        assert_eq!(snapshot.metrics.unread_messages_count, 4);
        assert_eq!(snapshot.page_size, 20);
        assert!(!snapshot.is_loading);
        session.teardown();
    }

    #[tokio::test]
    async fn test_empty_scope_skips_store() {
        let fx = Fixture::new(vec![complete("a", "acc-1")], vec![]);
        let session = fx.mount(quick()).await;
        let calls_before = fx.store.fetch_calls();

        let mut filters = session.filters();
        filters.account_ids.clear();
        assert!(session.update_filters(filters).await);
        assert_eq!(fx.store.fetch_calls(), calls_before);
        assert!(session.snapshot().records.is_empty());
        session.teardown();
    }

    #[tokio::test]
    async fn test_trends_after_second_refresh() {
        let fx = Fixture::new(vec![complete("a", "acc-1")], vec![]);
        let session = fx.mount(quick()).await;
        assert!(session.snapshot().trends.is_empty());

        fx.store.records.lock().unwrap().push(complete("b", "acc-1"));
        session.refresh().await;
        let trends = session.snapshot().trends;
        let total = trends.iter().find(|t| t.metric == "total_count").unwrap();
        assert_eq!(total.previous, 1.0);
        assert_eq!(total.current, 2.0);
        session.teardown();
    }

    #[tokio::test]
    async fn test_selection_modes() {
        let fx = Fixture::new(vec![complete("a", "acc-1"), complete("b", "acc-1")], vec![]);
        let session = fx.mount(quick()).await;

        let all = session.update_selection(SelectionUpdate {
            mode: SelectionMode::All,
            ids: vec![],
        });
        assert_eq!(all, vec!["a", "b"]);
        let after_remove = session.update_selection(SelectionUpdate {
            mode: SelectionMode::Remove,
            ids: vec!["a".into()],
        });
        assert_eq!(after_remove, vec!["b"]);
        let cleared = session.update_selection(SelectionUpdate {
            mode: SelectionMode::Clear,
            ids: vec![],
        });
        assert!(cleared.is_empty());
        session.teardown();
    }

    #[tokio::test]
    async fn test_mark_read_uses_selection_and_notifies() {
        let fx = Fixture::new(vec![complete("a", "acc-1"), complete("b", "acc-1")], vec![]);
        let session = fx.mount(quick()).await;

        let nothing = session.mark_read(None).await;
        assert!(!nothing.success);

        session.update_selection(SelectionUpdate {
            mode: SelectionMode::Replace,
            ids: vec!["a".into()],
        });
        let result = session.mark_read(None).await;
        assert_eq!(result.data.unwrap().affected, 1);
        assert_eq!(session.snapshot().metrics.unread_messages_count, 2);

        let levels: Vec<NotificationLevel> = fx.notifier.all().iter().map(|n| n.level).collect();
        assert_eq!(
            levels,
            vec![NotificationLevel::Warning, NotificationLevel::Success]
        );
        session.teardown();
    }

    #[tokio::test]
    async fn test_incomplete_records_trigger_single_auto_enrich() {
        let mut partial = complete("a", "acc-1");
        partial.priority = None;
        let fx = Fixture::new(vec![partial], vec![enriched(1)]);
        let session = fx.mount(quick()).await;

        // повторные выборки до срабатывания задачи не дублируют запуск
        session.refresh().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let calls = fx.client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].action, EnrichmentAction::EnrichExistingData);
        assert_eq!(calls[0].limit, Some(10));
        assert_eq!(calls[0].account_id, "acc-1");
        session.teardown();
    }

    #[tokio::test]
    async fn test_teardown_cancels_pending_auto_enrich() {
        let mut partial = complete("a", "acc-1");
        partial.attachments_count = None;
        let fx = Fixture::new(vec![partial], vec![]);
        let session = fx
            .mount(ConsoleSettings {
                auto_enrich_delay: Duration::from_millis(100),
                ..Default::default()
            })
            .await;
        session.teardown();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(fx.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_enrich_records_report_and_refreshes() {
        let fx = Fixture::new(
            vec![complete("a", "acc-1")],
            vec![enriched(25), Err(EnrichmentError::Transport("timeout".into()))],
        );
        let session = fx.mount(quick()).await;
        let fetches = fx.store.fetch_calls();

        let report = session.batch_enrich("acc-1", Some(47), Some(25)).await;
        assert_eq!(report.batches_done, 2);
        assert_eq!(fx.store.fetch_calls(), fetches + 1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.enrichment.last_report, Some(report));
        assert!(!snapshot.is_enriching);
        session.teardown();
    }

    #[tokio::test]
    async fn test_teardown_cancels_every_batch_run() {
        let client = Arc::new(SlowClient::default());
        let store = Arc::new(MemoryReturnStore::with_records(vec![
            complete("a", "acc-1"),
            complete("b", "acc-2"),
        ]));
        let deps = EnrichmentDeps {
            client: client.clone(),
            store,
            tracker: Arc::new(ProgressTracker::new()),
            sleeper: Arc::new(RecordingSleeper::default()),
            settings: EnrichmentSettings::default(),
        };
        let notifier = Arc::new(RecordingNotifier::default());
        let session = ReturnsSession::mount("s-1".into(), deps, notifier, quick(), Utc::now())
            .await
            .unwrap();

        session.start_batch_enrich("acc-1".into(), Some(100), Some(1));
        session.start_batch_enrich("acc-2".into(), Some(100), Some(1));
        tokio::time::sleep(Duration::from_millis(50)).await;

        session.teardown();
        drop(session);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let at_teardown = client.calls.load(Ordering::SeqCst);
        assert!(at_teardown > 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), at_teardown);
    }

    #[tokio::test]
    async fn test_auto_enrich_merges_accounts_scheduled_during_delay() {
        let now = Utc::now();
        let mut newest = complete("a", "acc-1");
        newest.priority = None;
        newest.created_at = now;
        let mut older = complete("b", "acc-2");
        older.attachments_count = None;
        older.created_at = now - chrono::Duration::hours(1);

        let fx = Fixture::new(vec![newest, older], vec![]);
        let session = fx
            .mount(ConsoleSettings {
                card_page_size: 1,
                auto_enrich_delay: Duration::from_millis(100),
                ..Default::default()
            })
            .await;

        session
            .update_view(ViewSettings {
                page: 1,
                ..Default::default()
            })
            .await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mut accounts: Vec<String> = fx
            .client
            .calls()
            .into_iter()
            .map(|c| c.account_id)
            .collect();
        accounts.sort();
        assert_eq!(accounts, vec!["acc-1", "acc-2"]);
        session.teardown();
    }
}
