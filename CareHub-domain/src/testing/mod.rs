// Testing utilities and fakes for the domain layer
// Available in unit tests and, for other crates, with the "mock" feature

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::auth::sms::{SmsError, SmsSender};
use crate::auth::wechat::{WeChatClient, WeChatError, WeChatSession};
use crate::health::{ComponentStatus, HealthComponent, HealthServiceTrait, SystemHealth, SystemStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// SMS sender that remembers every code instead of sending it
#[derive(Debug, Default)]
pub struct RecordingSmsSender {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingSmsSender {
    /// A sender whose gateway always rejects the message
    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    /// Every (phone, code) pair sent so far
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }

    /// Most recent code sent to `phone`
    pub fn last_code_for(&self, phone: &str) -> Option<String> {
        lock(&self.sent)
            .iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl SmsSender for RecordingSmsSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        if self.fail {
            return Err(SmsError::Rejected("gateway unavailable".to_string()));
        }
        lock(&self.sent).push((phone.to_string(), code.to_string()));
        Ok(())
    }
}

/// WeChat client answering from a fixed code -> openid table
#[derive(Debug, Default)]
pub struct StubWeChatClient {
    sessions: HashMap<String, String>,
}

impl StubWeChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `code` as a login for `openid`
    pub fn with_code(mut self, code: &str, openid: &str) -> Self {
        self.sessions.insert(code.to_string(), openid.to_string());
        self
    }
}

#[async_trait]
impl WeChatClient for StubWeChatClient {
    async fn code_to_session(&self, code: &str) -> Result<WeChatSession, WeChatError> {
        match self.sessions.get(code) {
            Some(openid) => Ok(WeChatSession { openid: openid.clone(), unionid: None }),
            None => Err(WeChatError::InvalidCode("code been used".to_string())),
        }
    }
}

/// Health service with a fixed answer
#[derive(Debug)]
pub struct MockHealthService {
    components: HashMap<String, HealthComponent>,
    environment: String,
}

impl Default for MockHealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHealthService {
    /// Every component healthy
    pub fn new() -> Self {
        let mut components = HashMap::new();
        components.insert("database".to_string(), HealthComponent::healthy());
        components.insert("api".to_string(), HealthComponent::healthy());
        Self { components, environment: "test".to_string() }
    }

    pub fn with_degraded_database(self) -> Self {
        self.with_component("database", ComponentStatus::Degraded, "Database is experiencing high latency")
    }

    pub fn with_unhealthy_database(self) -> Self {
        self.with_component("database", ComponentStatus::Unhealthy, "Database connection failed")
    }

    pub fn with_component(mut self, name: &str, status: ComponentStatus, details: &str) -> Self {
        self.components
            .insert(name.to_string(), HealthComponent::with_status(status, details));
        self
    }
}

#[async_trait]
impl HealthServiceTrait for MockHealthService {
    async fn get_system_health(&self) -> SystemHealth {
        SystemHealth::from_components(self.components.clone(), 42, &self.environment)
    }

    async fn check_database_status(&self) -> HealthComponent {
        self.components
            .get("database")
            .cloned()
            .unwrap_or_else(HealthComponent::healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_sender() {
        let sender = RecordingSmsSender::default();
        sender.send_code("13800138000", "111111").await.unwrap();
        sender.send_code("13800138000", "222222").await.unwrap();

        assert_eq!(sender.sent().len(), 2);
        assert_eq!(sender.last_code_for("13800138000").as_deref(), Some("222222"));
        assert!(sender.last_code_for("13900139000").is_none());

        assert!(RecordingSmsSender::failing().send_code("13800138000", "1").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_health_status() {
        let health = MockHealthService::new().with_unhealthy_database().get_system_health().await;
        assert_eq!(health.status, SystemStatus::Unhealthy);
    }
}
