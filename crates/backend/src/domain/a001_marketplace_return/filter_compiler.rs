//! Компиляция критериев фильтрации в список предикатов.
//!
//! Один и тот же список `Clause` исполняется двумя способами: как условие
//! sea-orm для SQL-хранилища и как предикат над записью в памяти.
//! Условие просрочки не хранит момент времени: `now` передается при каждом
//! выполнении.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use contracts::domain::a001_marketplace_return::{ReturnPriority, ReturnRecord, ReturnStatus};
use contracts::shared::return_filters::{
    FilterCriteria, SortDirection, SortField, SortSpec, ViewSettings,
};
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select};
use std::cmp::Ordering;
use thiserror::Error;

use super::repository::{Column, Entity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("account scope is empty")]
    EmptyAccountScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagField {
    Escalated,
    InMediation,
    SellerActionRequired,
}

/// Предикат над возвратом
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    AccountIn(Vec<String>),
    /// Подстрока в нижнем регистре: order_id OR claim_id OR title OR sku
    Search(String),
    StatusIs(ReturnStatus),
    CreatedFrom(DateTime<Utc>),
    /// Строго меньше: начало дня, следующего за date_to
    CreatedBefore(DateTime<Utc>),
    PriorityIn(Vec<ReturnPriority>),
    ModerationIn(Vec<String>),
    Flag(FlagField, bool),
    RetainedValueAtLeast(f64),
    RetainedValueAtMost(f64),
    UnreadAtLeast(i32),
    ResponseTimeAtMost(f64),
    HasTrackingCode(bool),
    HasAttachments(bool),
    Overdue(bool),
}

/// Запрос, готовый к выполнению в хранилище
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub clauses: Vec<Clause>,
    pub sort: SortSpec,
    pub limit: u64,
    pub offset: u64,
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Собрать запрос. Без аккаунтов в области видимости запрос не строится.
pub fn compile(
    criteria: &FilterCriteria,
    view: &ViewSettings,
    page_size: u64,
) -> Result<CompiledQuery, FilterError> {
    let mut accounts: Vec<String> = criteria
        .account_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    accounts.sort();
    accounts.dedup();
    if accounts.is_empty() {
        return Err(FilterError::EmptyAccountScope);
    }

    let mut clauses = vec![Clause::AccountIn(accounts)];

    if let Some(search) = criteria.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            clauses.push(Clause::Search(search.to_lowercase()));
        }
    }
    if let Some(status) = criteria.status {
        clauses.push(Clause::StatusIs(status));
    }
    if let Some(date_from) = criteria.date_from {
        clauses.push(Clause::CreatedFrom(start_of_day(date_from)));
    }
    if let Some(date_to) = criteria.date_to {
        clauses.push(Clause::CreatedBefore(
            start_of_day(date_to) + chrono::Duration::days(1),
        ));
    }
    if !criteria.priorities.is_empty() {
        clauses.push(Clause::PriorityIn(criteria.priorities.clone()));
    }
    if !criteria.moderation_statuses.is_empty() {
        clauses.push(Clause::ModerationIn(criteria.moderation_statuses.clone()));
    }
    if let Some(flag) = criteria.escalated {
        clauses.push(Clause::Flag(FlagField::Escalated, flag));
    }
    if let Some(flag) = criteria.in_mediation {
        clauses.push(Clause::Flag(FlagField::InMediation, flag));
    }
    if let Some(flag) = criteria.seller_action_required {
        clauses.push(Clause::Flag(FlagField::SellerActionRequired, flag));
    }
    if let Some(min) = criteria.min_retained_value {
        clauses.push(Clause::RetainedValueAtLeast(min));
    }
    if let Some(max) = criteria.max_retained_value {
        clauses.push(Clause::RetainedValueAtMost(max));
    }
    if let Some(min) = criteria.min_unread_messages {
        clauses.push(Clause::UnreadAtLeast(min));
    }
    if let Some(max) = criteria.max_avg_response_time {
        clauses.push(Clause::ResponseTimeAtMost(max));
    }
    if let Some(present) = criteria.has_tracking_code {
        clauses.push(Clause::HasTrackingCode(present));
    }
    if let Some(present) = criteria.has_attachments {
        clauses.push(Clause::HasAttachments(present));
    }
    if let Some(overdue) = criteria.overdue_actions {
        clauses.push(Clause::Overdue(overdue));
    }

    Ok(CompiledQuery {
        clauses,
        sort: view.sort,
        limit: page_size,
        offset: view.page.saturating_mul(page_size),
    })
}

impl Clause {
    /// Проверка записи в памяти (та же семантика, что и в SQL)
    pub fn matches(&self, record: &ReturnRecord, now: DateTime<Utc>) -> bool {
        match self {
            Clause::AccountIn(ids) => ids.iter().any(|id| *id == record.account_id),
            Clause::Search(needle) => [
                &record.order_id,
                &record.claim_id,
                &record.product_title,
                &record.sku,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(needle.as_str())),
            Clause::StatusIs(status) => record.status == Some(*status),
            Clause::CreatedFrom(from) => record.created_at >= *from,
            Clause::CreatedBefore(before) => record.created_at < *before,
            // null-приоритет не входит ни в один набор (семантика IN)
            Clause::PriorityIn(set) => record.priority.map(|p| set.contains(&p)).unwrap_or(false),
            Clause::ModerationIn(set) => record
                .moderation_status
                .as_ref()
                .map(|m| set.contains(m))
                .unwrap_or(false),
            Clause::Flag(field, expected) => {
                let actual = match field {
                    FlagField::Escalated => record.escalated_to_marketplace,
                    FlagField::InMediation => record.in_mediation,
                    FlagField::SellerActionRequired => record.seller_action_required,
                };
                actual == *expected
            }
            Clause::RetainedValueAtLeast(min) => {
                record.retained_value.map(|v| v >= *min).unwrap_or(false)
            }
            Clause::RetainedValueAtMost(max) => {
                record.retained_value.map(|v| v <= *max).unwrap_or(false)
            }
            Clause::UnreadAtLeast(min) => record.unread_messages.map(|v| v >= *min).unwrap_or(false),
            Clause::ResponseTimeAtMost(max) => {
                record.avg_response_time.map(|v| v <= *max).unwrap_or(false)
            }
            Clause::HasTrackingCode(present) => record.has_tracking_code() == *present,
            // 0 и null различаются: null не проходит ни одну из веток
            Clause::HasAttachments(true) => record.attachments_count.map(|c| c > 0).unwrap_or(false),
            Clause::HasAttachments(false) => record.attachments_count == Some(0),
            Clause::Overdue(overdue) => record.is_overdue_at(now) == *overdue,
        }
    }

    /// Условие для SQL
    pub fn to_condition(&self, now: DateTime<Utc>) -> Condition {
        match self {
            Clause::AccountIn(ids) => Condition::all().add(Column::AccountId.is_in(ids.clone())),
            Clause::Search(needle) => {
                let pattern = glob_pattern(needle);
                [Column::OrderId, Column::ClaimId, Column::ProductTitle, Column::Sku]
                    .into_iter()
                    .fold(Condition::any(), |cond, column| {
                        cond.add(Expr::cust_with_exprs(
                            "? GLOB ?",
                            [
                                SimpleExpr::from(Expr::col(column)),
                                SimpleExpr::from(Expr::val(pattern.as_str())),
                            ],
                        ))
                    })
            }
            Clause::StatusIs(status) => {
                Condition::all().add(Column::StatusDevolucao.eq(status.code()))
            }
            Clause::CreatedFrom(from) => Condition::all().add(Column::CreatedAt.gte(*from)),
            Clause::CreatedBefore(before) => Condition::all().add(Column::CreatedAt.lt(*before)),
            Clause::PriorityIn(set) => Condition::all().add(
                Column::Priority.is_in(set.iter().map(|p| p.code()).collect::<Vec<_>>()),
            ),
            Clause::ModerationIn(set) => {
                Condition::all().add(Column::ModerationStatus.is_in(set.clone()))
            }
            Clause::Flag(field, expected) => {
                let column = match field {
                    FlagField::Escalated => Column::EscalatedToMarketplace,
                    FlagField::InMediation => Column::InMediation,
                    FlagField::SellerActionRequired => Column::SellerActionRequired,
                };
                Condition::all().add(column.eq(*expected))
            }
            Clause::RetainedValueAtLeast(min) => {
                Condition::all().add(Column::RetainedValue.gte(*min))
            }
            Clause::RetainedValueAtMost(max) => {
                Condition::all().add(Column::RetainedValue.lte(*max))
            }
            Clause::UnreadAtLeast(min) => Condition::all().add(Column::UnreadMessages.gte(*min)),
            Clause::ResponseTimeAtMost(max) => {
                Condition::all().add(Column::AvgResponseTime.lte(*max))
            }
            Clause::HasTrackingCode(true) => Condition::all()
                .add(Column::TrackingCode.is_not_null())
                .add(Column::TrackingCode.ne("")),
            Clause::HasTrackingCode(false) => Condition::any()
                .add(Column::TrackingCode.is_null())
                .add(Column::TrackingCode.eq("")),
            Clause::HasAttachments(true) => Condition::all().add(Column::AttachmentsCount.gt(0)),
            Clause::HasAttachments(false) => Condition::all().add(Column::AttachmentsCount.eq(0)),
            Clause::Overdue(true) => Condition::all()
                .add(Column::ActionDueAt.is_not_null())
                .add(Column::ActionDueAt.lt(now)),
            Clause::Overdue(false) => Condition::any()
                .add(Column::ActionDueAt.is_null())
                .add(Column::ActionDueAt.gte(now)),
        }
    }
}

/// Шаблон GLOB для подстроки без учета регистра.
///
/// SQLite `lower()` понижает только ASCII, поэтому регистр раскрывается
/// в классы символов (`т` -> `[тТ]`, `ê` -> `[êÊ]`). Метасимволы GLOB
/// экранируются классом из одного символа; `%` и `_` в GLOB обычные символы.
pub fn glob_pattern(needle: &str) -> String {
    let mut pattern = String::from("*");
    for ch in needle.chars() {
        let mut upper = ch.to_uppercase();
        match (upper.next(), upper.next()) {
            (Some(u), None) if u != ch => {
                pattern.push('[');
                pattern.push(ch);
                pattern.push(u);
                pattern.push(']');
            }
            _ if matches!(ch, '*' | '?' | '[') => {
                pattern.push('[');
                pattern.push(ch);
                pattern.push(']');
            }
            _ => pattern.push(ch),
        }
    }
    pattern.push('*');
    pattern
}

fn priority_rank_expr() -> SimpleExpr {
    Expr::cust(
        "CASE priority WHEN 'critical' THEN 0 WHEN 'high' THEN 1 \
         WHEN 'medium' THEN 2 WHEN 'low' THEN 3 END",
    )
}

fn compare_by(field: SortField, a: &ReturnRecord, b: &ReturnRecord) -> Ordering {
    fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
        match (a, b) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (x, y) => x.is_some().cmp(&y.is_some()),
        }
    }

    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::ActionDueAt => a.action_due_at.cmp(&b.action_due_at),
        SortField::Priority => a
            .priority
            .map(|p| p.rank())
            .cmp(&b.priority.map(|p| p.rank())),
        SortField::Status => a.status.map(|s| s.code()).cmp(&b.status.map(|s| s.code())),
        SortField::RetainedValue => cmp_f64(a.retained_value, b.retained_value),
        SortField::UnreadMessages => a.unread_messages.cmp(&b.unread_messages),
        SortField::OrderId => a.order_id.cmp(&b.order_id),
    }
}

impl CompiledQuery {
    /// Все предикаты через AND
    pub fn to_condition(&self, now: DateTime<Utc>) -> Condition {
        self.clauses
            .iter()
            .fold(Condition::all(), |cond, clause| cond.add(clause.to_condition(now)))
    }

    pub fn to_select(&self, now: DateTime<Utc>) -> Select<Entity> {
        let order = match self.sort.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        let select = Entity::find().filter(self.to_condition(now));
        let select = match self.sort.field {
            SortField::CreatedAt => select.order_by(Column::CreatedAt, order),
            SortField::ActionDueAt => select.order_by(Column::ActionDueAt, order),
            SortField::Priority => select.order_by(priority_rank_expr(), order),
            SortField::Status => select.order_by(Column::StatusDevolucao, order),
            SortField::RetainedValue => select.order_by(Column::RetainedValue, order),
            SortField::UnreadMessages => select.order_by(Column::UnreadMessages, order),
            SortField::OrderId => select.order_by(Column::OrderId, order),
        };
        select.limit(self.limit).offset(self.offset)
    }

    pub fn matches(&self, record: &ReturnRecord, now: DateTime<Utc>) -> bool {
        self.clauses.iter().all(|clause| clause.matches(record, now))
    }

    /// Фильтр, сортировка и страница над коллекцией в памяти.
    /// Сортировка стабильная, равные элементы сохраняют исходный порядок.
    pub fn apply(&self, records: &[ReturnRecord], now: DateTime<Utc>) -> Vec<ReturnRecord> {
        let mut matched: Vec<ReturnRecord> = records
            .iter()
            .filter(|record| self.matches(record, now))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            let ordering = compare_by(self.sort.field, a, b);
            match self.sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        matched
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use contracts::shared::return_filters::DisplayMode;
    use sea_orm::{DbBackend, QueryTrait};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn criteria() -> FilterCriteria {
        FilterCriteria {
            account_ids: vec!["acc-1".to_string()],
            ..Default::default()
        }
    }

    fn view() -> ViewSettings {
        ViewSettings::default()
    }

    /// 100 записей: приоритеты по кругу, каждая третья просрочена
    fn fixture() -> Vec<ReturnRecord> {
        let priorities = [
            Some(ReturnPriority::Critical),
            Some(ReturnPriority::High),
            Some(ReturnPriority::Medium),
            Some(ReturnPriority::Low),
            None,
        ];
        (0..100)
            .map(|i| {
                let mut r = ReturnRecord::new(format!("r-{i}"), "acc-1", now() - Duration::hours(i));
                r.priority = priorities[i as usize % priorities.len()];
                r.action_due_at = match i % 3 {
                    0 => Some(now() - Duration::minutes(5)),
                    1 => Some(now() + Duration::hours(4)),
                    _ => None,
                };
                r
            })
            .collect()
    }

    #[test]
    fn test_empty_account_scope_is_refused() {
        let result = compile(&FilterCriteria::default(), &view(), 50);
        assert_eq!(result, Err(FilterError::EmptyAccountScope));

        let blank = FilterCriteria {
            account_ids: vec!["  ".to_string()],
            ..Default::default()
        };
        assert_eq!(compile(&blank, &view(), 50), Err(FilterError::EmptyAccountScope));
    }

    #[test]
    fn test_account_scope_is_first_clause() {
        let mut c = criteria();
        c.search = Some("abc".into());
        c.status = Some(ReturnStatus::Opened);
        let query = compile(&c, &view(), 50).unwrap();
        assert_eq!(query.clauses[0], Clause::AccountIn(vec!["acc-1".into()]));
        assert_eq!(query.clauses.len(), 3);
    }

    #[test]
    fn test_unset_fields_add_no_clauses() {
        let mut c = criteria();
        c.search = Some("   ".into());
        let query = compile(&c, &view(), 50).unwrap();
        assert_eq!(query.clauses.len(), 1);
    }

    #[test]
    fn test_priority_and_overdue_over_fixture() {
        let mut c = criteria();
        c.priorities = vec![ReturnPriority::Critical, ReturnPriority::High];
        c.overdue_actions = Some(true);
        let query = compile(&c, &view(), 1000).unwrap();

        let records = fixture();
        let mut reversed = records.clone();
        reversed.reverse();

        let matched = query.apply(&records, now());
        assert!(!matched.is_empty());
        for r in &matched {
            assert!(matches!(
                r.priority,
                Some(ReturnPriority::Critical) | Some(ReturnPriority::High)
            ));
            assert!(r.action_due_at.unwrap() < now());
        }
        let expected = records
            .iter()
            .filter(|r| {
                r.priority.map(|p| p.is_high()).unwrap_or(false) && r.is_overdue_at(now())
            })
            .count();
        assert_eq!(matched.len(), expected);

        let mut ids: Vec<_> = matched.iter().map(|r| r.id.clone()).collect();
        let mut ids_rev: Vec<_> = query
            .apply(&reversed, now())
            .iter()
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids_rev.sort();
        assert_eq!(ids, ids_rev);
    }

    #[test]
    fn test_overdue_is_evaluated_per_execution() {
        let mut c = criteria();
        c.overdue_actions = Some(true);
        let query = compile(&c, &view(), 10).unwrap();
        let mut r = ReturnRecord::new("r-1", "acc-1", now());
        r.action_due_at = Some(now() + Duration::minutes(30));

        assert!(!query.matches(&r, now()));
        assert!(query.matches(&r, now() + Duration::hours(1)));
    }

    #[test]
    fn test_attachments_zero_is_not_null() {
        let mut with_zero = ReturnRecord::new("a", "acc-1", now());
        with_zero.attachments_count = Some(0);
        let with_null = ReturnRecord::new("b", "acc-1", now());
        let mut with_two = ReturnRecord::new("c", "acc-1", now());
        with_two.attachments_count = Some(2);

        let absent = Clause::HasAttachments(false);
        let present = Clause::HasAttachments(true);
        assert!(absent.matches(&with_zero, now()));
        assert!(!absent.matches(&with_null, now()));
        assert!(!present.matches(&with_null, now()));
        assert!(present.matches(&with_two, now()));
    }

    #[test]
    fn test_tracking_code_presence() {
        let mut r = ReturnRecord::new("a", "acc-1", now());
        assert!(Clause::HasTrackingCode(false).matches(&r, now()));
        r.tracking_code = Some(String::new());
        assert!(Clause::HasTrackingCode(false).matches(&r, now()));
        r.tracking_code = Some("BR123".into());
        assert!(Clause::HasTrackingCode(true).matches(&r, now()));
    }

    #[test]
    fn test_search_is_case_insensitive_or() {
        let mut c = criteria();
        c.search = Some("TÊNIS".into());
        let query = compile(&c, &view(), 10).unwrap();
        let mut r = ReturnRecord::new("a", "acc-1", now());
        r.product_title = "Tênis de corrida".into();
        assert!(query.matches(&r, now()));
        r.product_title = "Camiseta".into();
        r.sku = "tênis-01".into();
        assert!(query.matches(&r, now()));
        r.sku = "CM-01".into();
        assert!(!query.matches(&r, now()));
    }

    #[test]
    fn test_glob_pattern_folds_unicode_and_escapes() {
        assert_eq!(glob_pattern("tênis"), "*[tT][êÊ][nN][iI][sS]*");
        assert_eq!(glob_pattern("50%_"), "*50%_*");
        assert_eq!(glob_pattern("a*?[b"), "*[aA][*][?][[][bB]*");
        // ß не имеет однобуквенной заглавной формы
        assert_eq!(glob_pattern("ß"), "*ß*");
    }

    #[test]
    fn test_date_to_is_inclusive() {
        let mut c = criteria();
        c.date_from = NaiveDate::from_ymd_opt(2026, 10, 1);
        c.date_to = NaiveDate::from_ymd_opt(2026, 10, 18);
        let query = compile(&c, &view(), 10).unwrap();
        let late_same_day = ReturnRecord::new("a", "acc-1", Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 0).unwrap());
        let next_day = ReturnRecord::new("b", "acc-1", Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());
        assert!(query.matches(&late_same_day, now()));
        assert!(!query.matches(&next_day, now()));
    }

    #[test]
    fn test_pagination_offset_uses_page_size() {
        let settings = ViewSettings {
            page: 2,
            display_mode: DisplayMode::Table,
            ..Default::default()
        };
        let query = compile(&criteria(), &settings, 50).unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 100);

        let page = query.apply(&fixture(), now());
        // created_at desc: r-0 newest, page 2 of 50 is past the 100 fixture rows
        assert!(page.is_empty());
    }

    #[test]
    fn test_sort_priority_ascending_puts_nulls_then_critical() {
        let settings = ViewSettings {
            sort: SortSpec {
                field: SortField::Priority,
                direction: SortDirection::Asc,
            },
            ..Default::default()
        };
        let query = compile(&criteria(), &settings, 100).unwrap();
        let page = query.apply(&fixture(), now());
        assert_eq!(page[0].priority, None);
        let first_set = page.iter().find(|r| r.priority.is_some()).unwrap();
        assert_eq!(first_set.priority, Some(ReturnPriority::Critical));
    }

    #[test]
    fn test_sql_rendering() {
        let mut c = criteria();
        c.account_ids.push("acc-2".into());
        c.search = Some("Abc".into());
        c.priorities = vec![ReturnPriority::High];
        c.has_attachments = Some(false);
        let settings = ViewSettings {
            page: 1,
            ..Default::default()
        };
        let query = compile(&c, &settings, 12).unwrap();
        let sql = query.to_select(now()).build(DbBackend::Sqlite).to_string();

        assert!(sql.contains("\"account_id\" IN ('acc-1', 'acc-2')"), "{sql}");
        assert!(sql.contains("GLOB '*[aA][bB][cC]*'"), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert!(sql.contains("\"priority\" IN ('high')"), "{sql}");
        assert!(sql.contains("\"attachments_count\" = 0"), "{sql}");
        assert!(sql.contains("ORDER BY"), "{sql}");
        assert!(sql.contains("LIMIT 12"), "{sql}");
        assert!(sql.contains("OFFSET 12"), "{sql}");
    }
}
