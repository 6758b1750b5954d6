//! WeChat mini-program login (`jscode2session`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::WeChatConfig;

/// WeChat login errors
#[derive(Debug, Error)]
pub enum WeChatError {
    /// App id / secret are not configured
    #[error("WeChat login is not configured")]
    NotConfigured,

    /// The login code was rejected (expired, reused or forged)
    #[error("Invalid WeChat login code: {0}")]
    InvalidCode(String),

    /// WeChat asked us to slow down
    #[error("WeChat API rate limit reached")]
    RateLimited,

    /// Any other `errcode` returned by WeChat
    #[error("WeChat API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Network or decoding failure
    #[error("WeChat request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for WeChatError {
    fn from(err: reqwest::Error) -> Self {
        WeChatError::Transport(err.to_string())
    }
}

/// Identity returned for a login code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeChatSession {
    pub openid: String,
    pub unionid: Option<String>,
}

/// Exchanges mini-program login codes for user identities
#[async_trait]
pub trait WeChatClient: Send + Sync {
    async fn code_to_session(&self, code: &str) -> Result<WeChatSession, WeChatError>;
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    openid: Option<String>,
    unionid: Option<String>,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl SessionResponse {
    fn into_session(self) -> Result<WeChatSession, WeChatError> {
        match self.errcode {
            0 => match self.openid {
                Some(openid) if !openid.is_empty() => Ok(WeChatSession { openid, unionid: self.unionid }),
                _ => Err(WeChatError::Api { code: 0, message: "response had no openid".to_string() }),
            },
            40029 | 40163 => Err(WeChatError::InvalidCode(self.errmsg)),
            45011 => Err(WeChatError::RateLimited),
            code => Err(WeChatError::Api { code, message: self.errmsg }),
        }
    }
}

/// Client for the WeChat `sns/jscode2session` endpoint
#[derive(Debug, Clone)]
pub struct HttpWeChatClient {
    client: Client,
    app_id: String,
    app_secret: String,
    api_base: String,
}

impl HttpWeChatClient {
    /// `Ok(None)` when WeChat login is not configured
    pub fn from_config(config: &WeChatConfig) -> Result<Option<Self>, WeChatError> {
        let (app_id, app_secret) = match (&config.app_id, &config.app_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => return Ok(None),
        };

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Some(Self {
            client,
            app_id,
            app_secret,
            api_base: config.api_base.clone(),
        }))
    }
}

#[async_trait]
impl WeChatClient for HttpWeChatClient {
    async fn code_to_session(&self, code: &str) -> Result<WeChatSession, WeChatError> {
        let url = format!("{}/sns/jscode2session", self.api_base);
        debug!("Exchanging WeChat login code");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("jscode2session returned HTTP {}", response.status());
            return Err(WeChatError::Transport(format!("HTTP {}", response.status())));
        }

        // WeChat serves JSON as text/plain
        let body = response.text().await?;
        let parsed: SessionResponse =
            serde_json::from_str(&body).map_err(|e| WeChatError::Transport(e.to_string()))?;

        parsed.into_session()
    }
}

/// Used when WeChat credentials are absent; every login fails with `NotConfigured`
#[derive(Debug, Default, Clone)]
pub struct DisabledWeChatClient;

#[async_trait]
impl WeChatClient for DisabledWeChatClient {
    async fn code_to_session(&self, _code: &str) -> Result<WeChatSession, WeChatError> {
        Err(WeChatError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<WeChatSession, WeChatError> {
        serde_json::from_str::<SessionResponse>(body).unwrap().into_session()
    }

    #[test]
    fn test_successful_session() {
        let session = parse(r#"{"openid":"o-abc","session_key":"k","unionid":"u-1"}"#).unwrap();
        assert_eq!(session.openid, "o-abc");
        assert_eq!(session.unionid.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_errcode_mapping() {
        assert!(matches!(
            parse(r#"{"errcode":40029,"errmsg":"invalid code"}"#),
            Err(WeChatError::InvalidCode(_))
        ));
        assert!(matches!(parse(r#"{"errcode":45011,"errmsg":"freq limit"}"#), Err(WeChatError::RateLimited)));
        assert!(matches!(
            parse(r#"{"errcode":-1,"errmsg":"system busy"}"#),
            Err(WeChatError::Api { code: -1, .. })
        ));
        assert!(parse(r#"{"errcode":0}"#).is_err());
    }

    #[test]
    fn test_client_disabled_without_credentials() {
        let config = WeChatConfig { app_id: Some("wx1".to_string()), ..Default::default() };
        assert!(HttpWeChatClient::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_client() {
        let result = DisabledWeChatClient.code_to_session("code").await;
        assert!(matches!(result, Err(WeChatError::NotConfigured)));
    }
}
