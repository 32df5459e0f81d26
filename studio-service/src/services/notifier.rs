//! Text message notifications.

use crate::config::SmsConfig;
use crate::services::metrics::record_sms;
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::observability::TracedClientExt;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMS provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::InvalidRecipient(_) => AppError::BadRequest(anyhow::Error::new(err)),
            _ => AppError::BadGateway(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsReceipt {
    pub to: String,
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, sms: &SmsMessage) -> Result<SmsReceipt, NotifyError>;
    fn is_enabled(&self) -> bool;
}

/// Digits with an optional leading `+`. Everything else is dropped.
pub fn normalize_phone(raw: &str) -> Result<String, NotifyError> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(NotifyError::InvalidRecipient(
            "Phone number has no digits".to_string(),
        ));
    }
    if trimmed.starts_with('+') {
        Ok(format!("+{}", digits))
    } else {
        Ok(digits)
    }
}

pub fn reminder_message(client_name: &str, remaining: Decimal, currency: &str) -> String {
    format!(
        "Hi {}, this is a friendly reminder that your studio balance of {:.2} {} is pending. Thank you!",
        client_name,
        remaining,
        currency
    )
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    sender: &'a str,
    sms: Vec<SendItem<'a>>,
}

#[derive(Debug, Serialize)]
struct SendItem<'a> {
    message: &'a str,
    to: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(rename = "type")]
    response_type: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

/// JSON-over-HTTP SMS gateway (Msg91 flow API shape).
pub struct HttpSmsProvider {
    config: SmsConfig,
    client: reqwest::Client,
}

impl HttpSmsProvider {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn deliver(
        &self,
        auth_key: &str,
        to: &str,
        body: &str,
    ) -> Result<Option<String>, NotifyError> {
        let request = SendRequest {
            sender: &self.config.sender_id,
            sms: vec![SendItem {
                message: body,
                to: vec![to],
            }],
        };

        let response = self
            .client
            .traced_post(&self.config.api_url)
            .header("authkey", auth_key)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| NotifyError::Connection(format!("SMS gateway unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::SendFailed(format!(
                "SMS gateway returned {}: {}",
                status, body
            )));
        }

        let body: SendResponse = response.json().await.map_err(|e| {
            NotifyError::SendFailed(format!("Unreadable SMS gateway response: {}", e))
        })?;

        if body.response_type != "success" {
            return Err(NotifyError::SendFailed(
                body.message.unwrap_or(body.response_type),
            ));
        }

        Ok(body.request_id)
    }
}

#[async_trait]
impl SmsProvider for HttpSmsProvider {
    async fn send(&self, sms: &SmsMessage) -> Result<SmsReceipt, NotifyError> {
        if !self.config.enabled {
            return Err(NotifyError::NotEnabled(
                "Set SMS_ENABLED=true to send reminders".to_string(),
            ));
        }
        let auth_key = self.config.auth_key.expose_secret();
        if auth_key.is_empty() {
            return Err(NotifyError::Configuration(
                "SMS auth key is not configured".to_string(),
            ));
        }

        let to = normalize_phone(&sms.to)?;
        let result = self.deliver(auth_key, &to, &sms.body).await;

        record_sms(result.is_ok());
        match result {
            Ok(provider_id) => {
                info!(to = %to, "SMS sent");
                Ok(SmsReceipt { to, provider_id })
            }
            Err(e) => {
                warn!(to = %to, error = %e, "SMS send failed");
                Err(e)
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Records messages instead of sending them.
pub struct MockSmsProvider {
    enabled: bool,
    sent: Mutex<Vec<SmsMessage>>,
}

impl MockSmsProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SmsProvider for MockSmsProvider {
    async fn send(&self, sms: &SmsMessage) -> Result<SmsReceipt, NotifyError> {
        if !self.enabled {
            return Err(NotifyError::NotEnabled(
                "Mock SMS provider is not enabled".to_string(),
            ));
        }
        let to = normalize_phone(&sms.to)?;
        let count = match self.sent.lock() {
            Ok(mut sent) => {
                sent.push(sms.clone());
                sent.len()
            }
            Err(_) => 0,
        };
        info!(to = %to, body_length = sms.body.len(), "[MOCK] SMS would be sent");
        Ok(SmsReceipt {
            to,
            provider_id: Some(format!("mock-sms-{}", count)),
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: String, enabled: bool) -> SmsConfig {
        SmsConfig {
            enabled,
            api_url,
            auth_key: Secret::new("test-key".to_string()),
            sender_id: "STUDIO".to_string(),
        }
    }

    fn message(to: &str) -> SmsMessage {
        SmsMessage {
            to: to.to_string(),
            body: "hello".to_string(),
        }
    }

    #[test]
    fn phone_numbers_keep_digits_and_leading_plus() {
        assert_eq!(normalize_phone("+506 8888-1234").unwrap(), "+50688881234");
        assert_eq!(normalize_phone("(506) 8888 1234").unwrap(), "50688881234");
        assert!(matches!(
            normalize_phone(" - "),
            Err(NotifyError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn reminder_mentions_amount_and_currency() {
        let text = reminder_message("Ana", Decimal::new(10050, 2), "USD");
        assert!(text.contains("Ana"));
        assert!(text.contains("100.50 USD"));
    }

    #[test]
    fn not_enabled_surfaces_as_bad_gateway() {
        let err: AppError = NotifyError::NotEnabled("off".to_string()).into();
        assert!(matches!(err, AppError::BadGateway(_)));
        assert!(err.public_message().contains("not enabled"));
    }

    #[tokio::test]
    async fn disabled_provider_does_not_send() {
        let provider = HttpSmsProvider::new(config("http://127.0.0.1:9".to_string(), false));
        let err = provider.send(&message("+50688881234")).await.unwrap_err();
        assert!(matches!(err, NotifyError::NotEnabled(_)));
    }

    #[tokio::test]
    async fn http_provider_posts_to_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authkey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "success",
                "message": "queued",
                "request_id": "req-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpSmsProvider::new(config(format!("{}/send", server.uri()), true));
        let receipt = provider.send(&message("+506 8888 1234")).await.unwrap();

        assert_eq!(receipt.to, "+50688881234");
        assert_eq!(receipt.provider_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn gateway_error_is_send_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "error",
                "message": "invalid sender"
            })))
            .mount(&server)
            .await;

        let provider = HttpSmsProvider::new(config(server.uri(), true));
        let err = provider.send(&message("88881234")).await.unwrap_err();
        assert!(matches!(err, NotifyError::SendFailed(_)));
    }

    #[tokio::test]
    async fn mock_provider_records_messages() {
        let provider = MockSmsProvider::new(true);
        provider.send(&message("8888-1234")).await.unwrap();
        assert_eq!(provider.sent().len(), 1);
    }
}
