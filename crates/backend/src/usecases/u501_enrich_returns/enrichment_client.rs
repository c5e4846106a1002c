use async_trait::async_trait;
use contracts::usecases::u501_enrich_returns::{EnrichmentEnvelope, EnrichmentResponse};
use thiserror::Error;

use crate::shared::config::EnrichmentConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    #[error("falha de transporte: {0}")]
    Transport(String),
    #[error("serviço respondeu {status}: {body}")]
    Status { status: u16, body: String },
    #[error("resposta inválida: {0}")]
    Decode(String),
    #[error("{0}")]
    Rejected(String),
}

/// Вызов внешнего сервиса обогащения
#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    async fn call(&self, envelope: &EnrichmentEnvelope) -> Result<EnrichmentResponse, EnrichmentError>;
}

/// HTTP-клиент сервиса обогащения: POST JSON-конверта на endpoint
pub struct HttpEnrichmentClient {
    client: reqwest::Client,
    endpoint_url: String,
    api_key: Option<String>,
}

/// Сколько символов тела ответа попадает в лог и в текст ошибки
const BODY_PREVIEW_CHARS: usize = 500;

fn preview(body: &str) -> String {
    crate::shared::json_path::truncate_with_ellipsis(body, BODY_PREVIEW_CHARS)
}

impl HttpEnrichmentClient {
    pub fn new(config: &EnrichmentConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
        })
    }
}

#[async_trait]
impl EnrichmentClient for HttpEnrichmentClient {
    async fn call(&self, envelope: &EnrichmentEnvelope) -> Result<EnrichmentResponse, EnrichmentError> {
        tracing::debug!(
            "Enrichment request: POST {} action={} account={}",
            self.endpoint_url,
            envelope.action.code(),
            envelope.account_id
        );

        let mut request = self.client.post(&self.endpoint_url).json(envelope);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EnrichmentError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EnrichmentError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(
                "Enrichment request failed with status {}: {}",
                status,
                preview(&body)
            );
            return Err(EnrichmentError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let parsed: EnrichmentResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse enrichment response: {}", e);
            EnrichmentError::Decode(format!("{}. Response: {}", e, preview(&body)))
        })?;

        if !parsed.success {
            let reason = parsed
                .error
                .clone()
                .or_else(|| parsed.message.clone())
                .unwrap_or_else(|| "serviço de enriquecimento recusou a solicitação".to_string());
            return Err(EnrichmentError::Rejected(reason));
        }

        Ok(parsed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_api_key_is_ignored() {
        let config = EnrichmentConfig {
            api_key: Some("  ".into()),
            ..Default::default()
        };
        let client = HttpEnrichmentClient::new(&config).unwrap();
        assert!(client.api_key.is_none());
    }

    #[test]
    fn test_error_messages() {
        let err = EnrichmentError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.to_string(), "serviço respondeu 502: bad gateway");
        assert_eq!(EnrichmentError::Rejected("limite".into()).to_string(), "limite");
    }
}
