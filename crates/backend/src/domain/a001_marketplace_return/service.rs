use chrono::{DateTime, Utc};
use contracts::domain::a001_marketplace_return::{ReturnPriority, ReturnRecord, ReturnTexts};
use contracts::shared::return_filters::{FilterCriteria, ViewSettings};

use super::extraction;
use super::filter_compiler::{self, FilterError};
use super::store::ReturnStore;

/// Страница выборки и общее количество по фильтру
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub records: Vec<ReturnRecord>,
    pub total: u64,
}

/// Выборка возвратов по критериям.
/// Пустая область аккаунтов дает пустой результат без обращения к хранилищу.
pub async fn search(
    store: &dyn ReturnStore,
    criteria: &FilterCriteria,
    view: &ViewSettings,
    page_size: u64,
    now: DateTime<Utc>,
) -> anyhow::Result<SearchPage> {
    let query = match filter_compiler::compile(criteria, view, page_size) {
        Ok(query) => query,
        Err(FilterError::EmptyAccountScope) => {
            tracing::debug!("Returns search skipped: no accounts in scope");
            return Ok(SearchPage::default());
        }
    };

    let records = store.fetch(&query, now).await?;
    let total = store.count(&query, now).await?;
    tracing::debug!(
        "Returns search: {} of {} records (page {})",
        records.len(),
        total,
        view.page
    );
    Ok(SearchPage { records, total })
}

pub async fn list_account_ids(store: &dyn ReturnStore) -> anyhow::Result<Vec<String>> {
    store.list_account_ids().await
}

pub async fn get_texts(store: &dyn ReturnStore, id: &str) -> anyhow::Result<Option<ReturnTexts>> {
    let record = store.get_by_id(id).await?;
    Ok(record.as_ref().map(extraction::extract_texts))
}

fn normalize_ids(ids: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

pub async fn mark_read(store: &dyn ReturnStore, ids: &[String]) -> anyhow::Result<u64> {
    let ids = normalize_ids(ids);
    if ids.is_empty() {
        return Ok(0);
    }
    store.mark_read(&ids).await
}

pub async fn set_priority(
    store: &dyn ReturnStore,
    ids: &[String],
    priority: ReturnPriority,
) -> anyhow::Result<u64> {
    let ids = normalize_ids(ids);
    if ids.is_empty() {
        return Ok(0);
    }
    store.set_priority(&ids, priority).await
}

pub async fn set_seller_action_required(
    store: &dyn ReturnStore,
    ids: &[String],
    required: bool,
) -> anyhow::Result<u64> {
    let ids = normalize_ids(ids);
    if ids.is_empty() {
        return Ok(0);
    }
    store.set_seller_action_required(&ids, required).await
}

#[cfg(test)]
mod tests {
    use super::super::store::test_support::MemoryReturnStore;
    use super::*;
    use chrono::Duration;

    fn fixture(now: DateTime<Utc>) -> Vec<ReturnRecord> {
        (0..5)
            .map(|i| {
                let mut r = ReturnRecord::new(
                    format!("r-{i}"),
                    if i % 2 == 0 { "acc-1" } else { "acc-2" },
                    now - Duration::days(i),
                );
                r.unread_messages = Some(3);
                r
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_scope_does_not_touch_store() {
        let now = Utc::now();
        let store = MemoryReturnStore::with_records(fixture(now));
        let criteria = FilterCriteria::default();
        let page = search(&store, &criteria, &ViewSettings::default(), 20, now)
            .await
            .unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(store.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_is_scoped_to_accounts() {
        let now = Utc::now();
        let store = MemoryReturnStore::with_records(fixture(now));
        let criteria = FilterCriteria {
            account_ids: vec!["acc-2".into()],
            ..Default::default()
        };
        let page = search(&store, &criteria, &ViewSettings::default(), 20, now)
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.records.iter().all(|r| r.account_id == "acc-2"));
        assert_eq!(store.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_ignores_blank_and_duplicate_ids() {
        let now = Utc::now();
        let store = MemoryReturnStore::with_records(fixture(now));
        let ids = vec!["r-1".to_string(), " r-1 ".to_string(), "".to_string()];
        let affected = mark_read(&store, &ids).await.unwrap();
        assert_eq!(affected, 1);
        let record = store.get_by_id("r-1").await.unwrap().unwrap();
        assert_eq!(record.unread_messages, Some(0));
        assert_eq!(mark_read(&store, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_priority_and_seller_flag() {
        let now = Utc::now();
        let store = MemoryReturnStore::with_records(fixture(now));
        let ids = vec!["r-0".to_string(), "r-3".to_string(), "missing".to_string()];
        assert_eq!(set_priority(&store, &ids, ReturnPriority::Critical).await.unwrap(), 2);
        assert_eq!(set_seller_action_required(&store, &ids, true).await.unwrap(), 2);
        let record = store.get_by_id("r-3").await.unwrap().unwrap();
        assert_eq!(record.priority, Some(ReturnPriority::Critical));
        assert!(record.seller_action_required);
    }

    #[tokio::test]
    async fn test_get_texts_for_unknown_record() {
        let store = MemoryReturnStore::default();
        assert!(get_texts(&store, "nope").await.unwrap().is_none());
    }
}
