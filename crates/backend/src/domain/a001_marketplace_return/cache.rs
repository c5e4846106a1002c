use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock};

use super::service::SearchPage;

/// Закешированная выборка и момент ее получения
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub page: SearchPage,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entry: Option<CachedPage>,
}

/// Кеш выборки сессии с номером поколения.
///
/// Загрузка запоминает поколение до запроса и сохраняет результат, только
/// если за время запроса кеш не был инвалидирован.
#[derive(Debug, Default)]
pub struct RecordCache {
    state: RwLock<CacheState>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    pub fn get(&self) -> Option<CachedPage> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entry
            .clone()
    }

    /// Сбросить выборку и начать новое поколение
    pub fn invalidate(&self) -> u64 {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        state.entry = None;
        state.generation
    }

    /// Сохранить выборку, полученную в поколении `generation`.
    /// Возвращает false, если поколение устарело.
    pub fn store(&self, generation: u64, page: SearchPage, fetched_at: DateTime<Utc>) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            tracing::debug!(
                "Discarding stale fetch: generation {} != {}",
                generation,
                state.generation
            );
            return false;
        }
        state.entry = Some(CachedPage { page, fetched_at });
        true
    }
}
