use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Types of authentication events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEventType {
    /// Verification code requested
    CodeRequested,
    /// Successful login (SMS or WeChat)
    Login,
    /// Failed login attempt
    FailedLogin,
    /// User account created on first login
    Registration,
    /// User logout
    Logout,
    /// Token refresh
    TokenRefresh,
    /// Token validation in middleware
    TokenValidation,
    /// Access denied to resource
    AccessDenied,
}

impl std::fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthEventType::CodeRequested => write!(f, "CODE_REQUESTED"),
            AuthEventType::Login => write!(f, "LOGIN"),
            AuthEventType::FailedLogin => write!(f, "FAILED_LOGIN"),
            AuthEventType::Registration => write!(f, "REGISTRATION"),
            AuthEventType::Logout => write!(f, "LOGOUT"),
            AuthEventType::TokenRefresh => write!(f, "TOKEN_REFRESH"),
            AuthEventType::TokenValidation => write!(f, "TOKEN_VALIDATION"),
            AuthEventType::AccessDenied => write!(f, "ACCESS_DENIED"),
        }
    }
}

/// Authentication event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    pub event_type: AuthEventType,
    /// User ID or masked phone, if known
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub details: Option<String>,
    /// Request path being accessed
    pub resource: Option<String>,
    pub duration_ms: Option<u64>,
    /// `sms`, `wechat`, `jwt`, `rbac`, ...
    pub auth_method: Option<String>,
}

impl AuthEvent {
    /// Create a new authentication event
    pub fn new(event_type: AuthEventType, user_id: Option<&str>, success: bool) -> Self {
        Self {
            event_type,
            user_id: user_id.map(String::from),
            timestamp: Utc::now(),
            success,
            details: None,
            resource: None,
            duration_ms: None,
            auth_method: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_auth_method(mut self, auth_method: impl Into<String>) -> Self {
        self.auth_method = Some(auth_method.into());
        self
    }
}

/// Emit an authentication event as structured tracing fields
pub fn log_auth_event(event: AuthEvent) {
    let user = event.user_id.as_deref().unwrap_or("anonymous");
    let details = event.details.as_deref().unwrap_or("");
    let resource = event.resource.as_deref().unwrap_or("");
    let method = event.auth_method.as_deref().unwrap_or("");

    if event.success {
        info!(
            target: "auth",
            event = %event.event_type,
            user = user,
            method = method,
            resource = resource,
            duration_ms = event.duration_ms,
            "AUTH-LOG {} SUCCESS {}",
            event.event_type,
            details
        );
    } else {
        warn!(
            target: "auth",
            event = %event.event_type,
            user = user,
            method = method,
            resource = resource,
            duration_ms = event.duration_ms,
            "AUTH-LOG {} FAILURE {}",
            event.event_type,
            details
        );
    }
}

/// Log a successful login
pub fn log_successful_login(user_id: &str, method: &str) {
    log_auth_event(AuthEvent::new(AuthEventType::Login, Some(user_id), true).with_auth_method(method));
}

/// Log a failed login attempt
pub fn log_failed_login(subject: &str, method: &str, reason: &str) {
    let event = AuthEvent::new(AuthEventType::FailedLogin, Some(subject), false)
        .with_details(reason)
        .with_auth_method(method);
    log_auth_event(event);
}

/// Log a token refresh
pub fn log_token_refresh(user_id: &str, success: bool, details: Option<&str>) {
    let mut event = AuthEvent::new(AuthEventType::TokenRefresh, Some(user_id), success)
        .with_auth_method("refresh_token");
    if let Some(d) = details {
        event = event.with_details(d);
    }
    log_auth_event(event);
}

/// Log a logout event
pub fn log_logout(user_id: &str) {
    log_auth_event(AuthEvent::new(AuthEventType::Logout, Some(user_id), true));
}

/// Log an access denied event
pub fn log_access_denied(user_id: &str, resource: &str, required_roles: &[String]) {
    let event = AuthEvent::new(AuthEventType::AccessDenied, Some(user_id), false)
        .with_resource(resource)
        .with_details(format!("Required roles: {}", required_roles.join(", ")))
        .with_auth_method("rbac");
    log_auth_event(event);
}
