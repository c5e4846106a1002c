use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Статус возврата (devolução) на маркетплейсе
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Opened,
    InProcess,
    WaitingSeller,
    Closed,
    Cancelled,
}

impl ReturnStatus {
    /// Код статуса в хранилище и в payload маркетплейса
    pub fn code(&self) -> &'static str {
        match self {
            ReturnStatus::Opened => "opened",
            ReturnStatus::InProcess => "in_process",
            ReturnStatus::WaitingSeller => "waiting_seller",
            ReturnStatus::Closed => "closed",
            ReturnStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "opened" => Some(ReturnStatus::Opened),
            "in_process" => Some(ReturnStatus::InProcess),
            "waiting_seller" => Some(ReturnStatus::WaitingSeller),
            "closed" => Some(ReturnStatus::Closed),
            "cancelled" => Some(ReturnStatus::Cancelled),
            _ => None,
        }
    }
}

/// Приоритет возврата
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl ReturnPriority {
    pub fn code(&self) -> &'static str {
        match self {
            ReturnPriority::Critical => "critical",
            ReturnPriority::High => "high",
            ReturnPriority::Medium => "medium",
            ReturnPriority::Low => "low",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "critical" => Some(ReturnPriority::Critical),
            "high" => Some(ReturnPriority::High),
            "medium" => Some(ReturnPriority::Medium),
            "low" => Some(ReturnPriority::Low),
            _ => None,
        }
    }

    /// Ранг для сортировки: critical первым
    pub fn rank(&self) -> u8 {
        match self {
            ReturnPriority::Critical => 0,
            ReturnPriority::High => 1,
            ReturnPriority::Medium => 2,
            ReturnPriority::Low => 3,
        }
    }

    /// high или critical
    pub fn is_high(&self) -> bool {
        matches!(self, ReturnPriority::Critical | ReturnPriority::High)
    }
}

/// Возврат / претензия маркетплейса
///
/// Payload-поля (`claim_data`, `order_data`, `return_data`, `messages_data`)
/// хранятся как есть: их структура зависит от источника и меняется со временем.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub id: String,

    /// Аккаунт продавца, к которому относится возврат
    pub account_id: String,

    pub order_id: String,
    pub claim_id: String,

    pub product_title: String,
    pub sku: String,

    /// Тип обращения (return, claim, mediation, ...)
    #[serde(default)]
    pub claim_type: Option<String>,

    #[serde(rename = "status_devolucao", default)]
    pub status: Option<ReturnStatus>,

    #[serde(default)]
    pub priority: Option<ReturnPriority>,

    #[serde(default)]
    pub moderation_status: Option<String>,

    #[serde(default)]
    pub escalated_to_marketplace: bool,
    #[serde(default)]
    pub in_mediation: bool,
    #[serde(default)]
    pub seller_action_required: bool,

    #[serde(default)]
    pub unread_messages: Option<i32>,
    #[serde(default)]
    pub attachments_count: Option<i32>,

    #[serde(default)]
    pub retained_value: Option<f64>,
    #[serde(default)]
    pub shipping_cost: Option<f64>,
    #[serde(default)]
    pub compensation_value: Option<f64>,

    /// Среднее время ответа, минуты
    #[serde(default)]
    pub avg_response_time: Option<f64>,
    /// Полное время решения, минуты
    #[serde(default)]
    pub total_resolution_time: Option<f64>,
    /// Удовлетворенность покупателя, 0..=1
    #[serde(default)]
    pub satisfaction: Option<f64>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub action_due_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tracking_code: Option<String>,

    #[serde(default)]
    pub automatic_tags: Vec<String>,

    #[serde(default)]
    pub claim_data: Option<serde_json::Value>,
    #[serde(default)]
    pub order_data: Option<serde_json::Value>,
    #[serde(default)]
    pub return_data: Option<serde_json::Value>,
    #[serde(default)]
    pub messages_data: Option<serde_json::Value>,
}

impl ReturnRecord {
    /// Пустая запись с обязательными идентификаторами
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            order_id: String::new(),
            claim_id: String::new(),
            product_title: String::new(),
            sku: String::new(),
            claim_type: None,
            status: None,
            priority: None,
            moderation_status: None,
            escalated_to_marketplace: false,
            in_mediation: false,
            seller_action_required: false,
            unread_messages: None,
            attachments_count: None,
            retained_value: None,
            shipping_cost: None,
            compensation_value: None,
            avg_response_time: None,
            total_resolution_time: None,
            satisfaction: None,
            created_at,
            action_due_at: None,
            tracking_code: None,
            automatic_tags: Vec::new(),
            claim_data: None,
            order_data: None,
            return_data: None,
            messages_data: None,
        }
    }

    /// Срок действия продавца истек к моменту `now`
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.action_due_at.map(|due| due < now).unwrap_or(false)
    }

    /// Трек-номер заполнен (не null и не пустая строка)
    pub fn has_tracking_code(&self) -> bool {
        self.tracking_code
            .as_deref()
            .map(|code| !code.is_empty())
            .unwrap_or(false)
    }
}

/// Человекочитаемые поля, извлеченные из payload возврата
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnTexts {
    pub return_id: String,
    pub cancel_reason: String,
    pub detailed_reason: String,
    pub transcript: String,
    pub last_message: String,
}
