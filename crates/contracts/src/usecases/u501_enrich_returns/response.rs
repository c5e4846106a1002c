use serde::{Deserialize, Serialize};

/// Ответ сервиса обогащения: `{success, ...payload | error}`.
/// Все поля полезной нагрузки необязательны: сервис возвращает только свои.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResponse {
    pub success: bool,
    #[serde(default)]
    pub enriched_count: Option<u64>,
    #[serde(default)]
    pub processed_count: Option<u64>,
    #[serde(default)]
    pub updated_count: Option<u64>,
    #[serde(default)]
    pub metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Единый результат операции оркестратора.
///
/// Ошибки транспорта и `success:false` приводятся к `{success:false, error}`;
/// вызывающий код проверяет флаг, а не ловит ошибки.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("erro desconhecido")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichCounts {
    pub enriched_count: u64,
    pub processed_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedCount {
    pub updated_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub metrics: serde_json::Value,
}
