use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

/// Уведомление для пользователя (toast)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    /// Категория события, например "enrichment" или "actions"
    pub category: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, category: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            category: category.to_string(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn success(category: &str, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, category, message)
    }

    pub fn warning(category: &str, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, category, message)
    }

    pub fn error(category: &str, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, category, message)
    }
}
