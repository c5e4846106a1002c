use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::time::{self, MissedTickBehavior};
use uuid::Uuid;

use super::session::{ConsoleSettings, ReturnsSession};
use crate::domain::a001_marketplace_return::store::ReturnStore;
use crate::shared::notifier::{LogNotifier, Notifier};
use crate::usecases::u501_enrich_returns::EnrichmentDeps;

struct Entry {
    session: Arc<ReturnsSession>,
    last_seen: Instant,
}

/// Открытые сессии экрана возвратов
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Entry>>,
    deps: EnrichmentDeps,
    settings: ConsoleSettings,
}

impl SessionRegistry {
    pub fn new(deps: EnrichmentDeps, settings: ConsoleSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            deps,
            settings,
        }
    }

    pub fn store(&self) -> Arc<dyn ReturnStore> {
        self.deps.store.clone()
    }

    pub async fn create(&self) -> anyhow::Result<Arc<ReturnsSession>> {
        let session_id = Uuid::new_v4().to_string();
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new(&session_id));
        let session = ReturnsSession::mount(
            session_id.clone(),
            self.deps.clone(),
            notifier,
            self.settings,
            Utc::now(),
        )
        .await?;
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                session_id,
                Entry {
                    session: session.clone(),
                    last_seen: Instant::now(),
                },
            );
        Ok(session)
    }

    /// Найти сессию и отметить обращение к ней
    pub fn get(&self, session_id: &str) -> Option<Arc<ReturnsSession>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.get_mut(session_id)?;
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    /// Закрыть сессию; false, если такой нет
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        match removed {
            Some(entry) => {
                entry.session.teardown();
                true
            }
            None => false,
        }
    }

    /// Закрыть сессии, простаивающие к моменту `now` не меньше таймаута.
    /// Возвращает идентификаторы закрытых.
    pub fn expire_idle_at(&self, now: Instant) -> Vec<String> {
        let Some(timeout) = self.settings.session_idle_timeout else {
            return Vec::new();
        };
        let expired: Vec<(String, Entry)> = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen) >= timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        for (id, entry) in &expired {
            tracing::info!("Session {} closed after {}s idle", id, timeout.as_secs());
            entry.session.teardown();
        }
        expired.into_iter().map(|(id, _)| id).collect()
    }

    /// Периодически закрывать простаивающие сессии; без таймаута сразу завершается
    pub async fn run_idle_sweeper(self: Arc<Self>) {
        let Some(timeout) = self.settings.session_idle_timeout else {
            tracing::info!("Session idle expiry is disabled");
            return;
        };
        let period = (timeout / 4).max(Duration::from_secs(1));
        tracing::info!("Session idle sweeper started with interval {}s", period.as_secs());
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let closed = self.expire_idle_at(Instant::now());
            if !closed.is_empty() {
                tracing::debug!("Idle sweep closed {} session(s)", closed.len());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
