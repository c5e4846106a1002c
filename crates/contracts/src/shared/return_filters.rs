use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::a001_marketplace_return::{ReturnPriority, ReturnStatus};

/// Критерии фильтрации списка возвратов.
///
/// Незаполненное поле (None или пустой список) не ограничивает выборку,
/// заполненные поля объединяются через AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Аккаунты продавца; без них запрос не выполняется
    #[serde(default)]
    pub account_ids: Vec<String>,

    /// Поиск по order_id, claim_id, названию товара и SKU (без учета регистра)
    #[serde(default)]
    pub search: Option<String>,

    #[serde(default)]
    pub status: Option<ReturnStatus>,

    /// Начало периода по created_at (включительно)
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Конец периода по created_at (включительно)
    #[serde(default)]
    pub date_to: Option<NaiveDate>,

    #[serde(default)]
    pub priorities: Vec<ReturnPriority>,

    #[serde(default)]
    pub moderation_statuses: Vec<String>,

    #[serde(default)]
    pub escalated: Option<bool>,
    #[serde(default)]
    pub in_mediation: Option<bool>,
    #[serde(default)]
    pub seller_action_required: Option<bool>,

    #[serde(default)]
    pub min_retained_value: Option<f64>,
    #[serde(default)]
    pub max_retained_value: Option<f64>,
    #[serde(default)]
    pub min_unread_messages: Option<i32>,
    /// Минуты
    #[serde(default)]
    pub max_avg_response_time: Option<f64>,

    #[serde(default)]
    pub has_tracking_code: Option<bool>,
    #[serde(default)]
    pub has_attachments: Option<bool>,

    /// Просроченные действия: action_due_at < now на момент выполнения запроса
    #[serde(default)]
    pub overdue_actions: Option<bool>,
}

impl FilterCriteria {
    /// Фильтры по умолчанию при открытии экрана: последние `period_days` дней
    pub fn default_for(account_ids: Vec<String>, today: NaiveDate, period_days: i64) -> Self {
        Self {
            account_ids,
            date_from: Some(today - chrono::Duration::days(period_days)),
            date_to: Some(today),
            ..Default::default()
        }
    }
}

/// Поле сортировки списка
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    ActionDueAt,
    Priority,
    Status,
    RetainedValue,
    UnreadMessages,
    OrderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

/// Режим отображения списка: у карточек и таблицы свои размеры страницы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Cards,
    Table,
}

/// Настройки представления: сортировка, режим, страница
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewSettings {
    #[serde(default)]
    pub sort: SortSpec,
    #[serde(default)]
    pub display_mode: DisplayMode,
    /// Номер страницы с нуля
    #[serde(default)]
    pub page: u64,
}
