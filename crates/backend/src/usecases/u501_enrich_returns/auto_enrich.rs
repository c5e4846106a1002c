use contracts::domain::a001_marketplace_return::ReturnRecord;
use std::collections::BTreeSet;

use crate::domain::a001_marketplace_return::extraction;

/// Запись не обогащена: нет переписки, приоритета или счетчика вложений
pub fn needs_enrichment(record: &ReturnRecord) -> bool {
    extraction::has_empty_timeline(record)
        || record.priority.is_none()
        || record.attachments_count.is_none()
}

/// Аккаунты, в выборке которых есть необогащенные записи (по возрастанию)
pub fn incomplete_accounts(records: &[ReturnRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| needs_enrichment(r))
        .map(|r| r.account_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
