use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contracts::domain::a001_marketplace_return::{ReturnPriority, ReturnRecord};

use super::filter_compiler::CompiledQuery;
use super::repository;

/// Хранилище возвратов, к которому обращаются фильтры и действия пользователя
#[async_trait]
pub trait ReturnStore: Send + Sync {
    async fn fetch(&self, query: &CompiledQuery, now: DateTime<Utc>) -> anyhow::Result<Vec<ReturnRecord>>;

    async fn count(&self, query: &CompiledQuery, now: DateTime<Utc>) -> anyhow::Result<u64>;

    async fn count_by_account(&self, account_id: &str) -> anyhow::Result<u64>;

    async fn list_account_ids(&self) -> anyhow::Result<Vec<String>>;

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<ReturnRecord>>;

    async fn mark_read(&self, ids: &[String]) -> anyhow::Result<u64>;

    async fn set_priority(&self, ids: &[String], priority: ReturnPriority) -> anyhow::Result<u64>;

    async fn set_seller_action_required(&self, ids: &[String], required: bool) -> anyhow::Result<u64>;
}

/// SQLite через sea-orm
#[derive(Debug, Clone, Copy, Default)]
pub struct SeaOrmReturnStore;

#[async_trait]
impl ReturnStore for SeaOrmReturnStore {
    async fn fetch(&self, query: &CompiledQuery, now: DateTime<Utc>) -> anyhow::Result<Vec<ReturnRecord>> {
        repository::fetch(query, now).await
    }

    async fn count(&self, query: &CompiledQuery, now: DateTime<Utc>) -> anyhow::Result<u64> {
        repository::count(query, now).await
    }

    async fn count_by_account(&self, account_id: &str) -> anyhow::Result<u64> {
        repository::count_by_account(account_id).await
    }

    async fn list_account_ids(&self) -> anyhow::Result<Vec<String>> {
        repository::list_account_ids().await
    }

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<ReturnRecord>> {
        repository::get_by_id(id).await
    }

    async fn mark_read(&self, ids: &[String]) -> anyhow::Result<u64> {
        repository::mark_read(ids).await
    }

    async fn set_priority(&self, ids: &[String], priority: ReturnPriority) -> anyhow::Result<u64> {
        repository::set_priority(ids, priority).await
    }

    async fn set_seller_action_required(&self, ids: &[String], required: bool) -> anyhow::Result<u64> {
        repository::set_seller_action_required(ids, required).await
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Хранилище в памяти со счетчиком выборок
    #[derive(Default)]
    pub struct MemoryReturnStore {
        pub records: Mutex<Vec<ReturnRecord>>,
        pub fetch_calls: AtomicUsize,
    }

    impl MemoryReturnStore {
        pub fn with_records(records: Vec<ReturnRecord>) -> Self {
            Self {
                records: Mutex::new(records),
                fetch_calls: AtomicUsize::new(0),
            }
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        fn update<F: Fn(&mut ReturnRecord)>(&self, ids: &[String], apply: F) -> u64 {
            let mut records = self.records.lock().unwrap();
            let mut affected = 0;
            for record in records.iter_mut().filter(|r| ids.contains(&r.id)) {
                apply(record);
                affected += 1;
            }
            affected
        }
    }

    #[async_trait]
    impl ReturnStore for MemoryReturnStore {
        async fn fetch(&self, query: &CompiledQuery, now: DateTime<Utc>) -> anyhow::Result<Vec<ReturnRecord>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let records = self.records.lock().unwrap();
            Ok(query.apply(&records, now))
        }

        async fn count(&self, query: &CompiledQuery, now: DateTime<Utc>) -> anyhow::Result<u64> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().filter(|r| query.matches(r, now)).count() as u64)
        }

        async fn count_by_account(&self, account_id: &str) -> anyhow::Result<u64> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().filter(|r| r.account_id == account_id).count() as u64)
        }

        async fn list_account_ids(&self) -> anyhow::Result<Vec<String>> {
            let records = self.records.lock().unwrap();
            let mut ids: Vec<String> = records.iter().map(|r| r.account_id.clone()).collect();
            ids.sort();
            ids.dedup();
            Ok(ids)
        }

        async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<ReturnRecord>> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().find(|r| r.id == id).cloned())
        }

        async fn mark_read(&self, ids: &[String]) -> anyhow::Result<u64> {
            Ok(self.update(ids, |r| r.unread_messages = Some(0)))
        }

        async fn set_priority(&self, ids: &[String], priority: ReturnPriority) -> anyhow::Result<u64> {
            Ok(self.update(ids, |r| r.priority = Some(priority)))
        }

        async fn set_seller_action_required(&self, ids: &[String], required: bool) -> anyhow::Result<u64> {
            Ok(self.update(ids, |r| r.seller_action_required = required))
        }
    }
}
