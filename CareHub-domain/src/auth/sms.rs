//! Delivery of verification codes by SMS

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{SmsConfig, SmsProvider};
use crate::util::mask_phone;

/// SMS delivery errors
#[derive(Debug, Error)]
pub enum SmsError {
    /// The gateway could not be reached
    #[error("SMS gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway answered with an error
    #[error("SMS gateway rejected the message: {0}")]
    Rejected(String),

    /// Sender is missing required settings
    #[error("SMS configuration error: {0}")]
    Config(String),
}

/// Sends verification codes to a phone
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SmsError>;
}

/// Development sender that writes codes to the log instead of sending them
#[derive(Debug, Default, Clone)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        info!(phone = %mask_phone(phone), code = %code, "SMS (log provider) verification code");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Sender that POSTs a templated message to an HTTP SMS gateway
#[derive(Debug, Clone)]
pub struct HttpSmsSender {
    client: Client,
    endpoint: String,
    access_key_id: String,
    access_key_secret: String,
    sign_name: Option<String>,
    template_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    phone_numbers: &'a str,
    sign_name: Option<&'a str>,
    template_code: Option<&'a str>,
    template_param: serde_json::Value,
}

impl HttpSmsSender {
    pub fn from_config(config: &SmsConfig) -> Result<Self, SmsError> {
        let missing = |key: &str| SmsError::Config(format!("{} is not set", key));
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone().ok_or_else(|| missing("SMS_ENDPOINT"))?,
            access_key_id: config.access_key_id.clone().ok_or_else(|| missing("SMS_ACCESS_KEY_ID"))?,
            access_key_secret: config
                .access_key_secret
                .clone()
                .ok_or_else(|| missing("SMS_ACCESS_KEY_SECRET"))?,
            sign_name: config.sign_name.clone(),
            template_code: config.template_code.clone(),
        })
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        let body = GatewayRequest {
            phone_numbers: phone,
            sign_name: self.sign_name.as_deref(),
            template_code: self.template_code.as_deref(),
            template_param: json!({ "code": code }),
        };

        debug!("Sending verification SMS to {}", mask_phone(phone));

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Access-Key-Id", &self.access_key_id)
            .header("X-Access-Key-Secret", &self.access_key_secret)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("SMS gateway returned HTTP {}", status);
            return Err(SmsError::Rejected(format!("HTTP {}", status)));
        }

        let reply: GatewayResponse = response.json().await?;
        match reply.code.as_deref() {
            None | Some("OK") | Some("0") => Ok(()),
            Some(other) => {
                let message = reply.message.unwrap_or_default();
                error!("SMS gateway error {}: {}", other, message);
                Err(SmsError::Rejected(format!("{} {}", other, message).trim().to_string()))
            }
        }
    }
}

/// Build the sender selected by `SMS_PROVIDER`
pub fn sender_from_config(config: &SmsConfig) -> Result<Arc<dyn SmsSender>, SmsError> {
    match config.provider {
        SmsProvider::Log => Ok(Arc::new(LogSmsSender)),
        SmsProvider::Http => Ok(Arc::new(HttpSmsSender::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        assert!(LogSmsSender.send_code("13800138000", "123456").await.is_ok());
    }

    #[test]
    fn test_http_sender_requires_endpoint() {
        let config = SmsConfig { provider: SmsProvider::Http, ..Default::default() };
        assert!(matches!(HttpSmsSender::from_config(&config), Err(SmsError::Config(_))));
    }

    #[test]
    fn test_sender_from_config() {
        assert!(sender_from_config(&SmsConfig::default()).is_ok());

        let config = SmsConfig {
            provider: SmsProvider::Http,
            endpoint: Some("https://sms.example.com/send".to_string()),
            access_key_id: Some("id".to_string()),
            access_key_secret: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(sender_from_config(&config).is_ok());
    }
}
