use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::logging::{log_auth_event, AuthEvent, AuthEventType};
use crate::config::ServerConfig;

// JWT issue/validation
pub mod token;

// Revoked token ids
pub mod token_blacklist;

// SMS one-time passwords
pub mod otp;
pub mod sms;

// WeChat mini-program login
pub mod wechat;

// Login / refresh / logout flows
pub mod service;

// Role-based access control
pub mod authorize;

// Structured auth event logging
pub mod logging;

pub use authorize::{require_any_role, require_role};
pub use otp::{OtpError, OtpPolicy, OtpStore};
pub use service::{AuthService, AuthServiceError, AuthServiceTrait, LoginResult, SmsCodeSent};
pub use sms::{sender_from_config, HttpSmsSender, LogSmsSender, SmsError, SmsSender};
pub use token::{Claims, SecurityError, TokenPair, TokenService, TokenType};
pub use token_blacklist::{start_cleanup_task, TokenBlacklist};
pub use wechat::{DisabledWeChatClient, HttpWeChatClient, WeChatClient, WeChatError, WeChatSession};

/// Authenticated caller, attached to request extensions by `auth_middleware`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    /// How the caller authenticated (always "jwt" for bearer tokens)
    pub auth_source: String,
}

impl UserInfo {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

fn bearer_token(req: &Request<Body>) -> Result<Option<&str>, &'static str> {
    let value = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => value,
        None => return Ok(None),
    };
    let value = value.to_str().map_err(|_| "Invalid Authorization header format")?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err("Authorization header does not contain Bearer token"),
    }
}

/// Validate an access token and build the caller's identity
fn authenticate(tokens: &TokenService, token: &str) -> Result<(UserInfo, Claims), SecurityError> {
    let claims = tokens.validate_token(token, TokenType::Access)?;
    let user = UserInfo {
        user_id: claims.user_id()?,
        roles: claims.roles.clone(),
        auth_source: "jwt".to_string(),
    };
    Ok((user, claims))
}

/// Authentication middleware for protected routes.
///
/// Requires `Authorization: Bearer <access token>`; on success the request
/// carries `UserInfo` and `Claims` extensions.
pub async fn auth_middleware(State(tokens): State<TokenService>, mut req: Request<Body>, next: Next) -> Response {
    let request_path = req.uri().path().to_string();
    let start_time = Instant::now();

    let failure = |details: String, subject: Option<&str>| {
        let event = AuthEvent::new(AuthEventType::TokenValidation, subject, false)
            .with_details(details)
            .with_resource(request_path.clone())
            .with_duration(start_time.elapsed().as_millis() as u64)
            .with_auth_method("jwt");
        log_auth_event(event);
    };

    let token = match bearer_token(&req) {
        Ok(Some(token)) => token.to_string(),
        Ok(None) => {
            debug!("Missing Authorization header");
            failure("Missing Authorization header".to_string(), None);
            return unauthorized("Authentication required");
        }
        Err(reason) => {
            warn!("{}", reason);
            failure(reason.to_string(), None);
            return unauthorized(reason);
        }
    };

    match authenticate(&tokens, &token) {
        Ok((user, claims)) => {
            debug!("Token validated for user {}", user.user_id);
            let event = AuthEvent::new(AuthEventType::TokenValidation, Some(&claims.sub), true)
                .with_resource(request_path.clone())
                .with_duration(start_time.elapsed().as_millis() as u64)
                .with_auth_method("jwt");
            log_auth_event(event);

            req.extensions_mut().insert(user);
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(SecurityError::TokenExpired) => {
            failure("JWT token has expired".to_string(), None);
            unauthorized("Token has expired")
        }
        Err(SecurityError::TokenRevoked) => {
            failure("Token has been revoked".to_string(), None);
            unauthorized("Token has been revoked")
        }
        Err(e) => {
            warn!("Token validation failed: {}", e);
            failure(e.to_string(), None);
            unauthorized("Invalid token")
        }
    }
}

/// Like `auth_middleware` but never rejects: anonymous requests, and requests
/// with an unusable token, simply proceed without `UserInfo`.
pub async fn optional_auth_middleware(
    State(tokens): State<TokenService>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = bearer_token(&req).ok().flatten().map(str::to_string);
    if let Some(token) = token {
        match authenticate(&tokens, &token) {
            Ok((user, claims)) => {
                req.extensions_mut().insert(user);
                req.extensions_mut().insert(claims);
            }
            Err(e) => debug!("Ignoring unusable bearer token on optional route: {}", e),
        }
    }
    next.run(req).await
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if config.cors_allowed_origins.is_empty() || config.cors_allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Wrap the application in CORS and security response headers
pub fn configure_security(app: axum::Router, config: &ServerConfig) -> axum::Router {
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ));

    let app = app.layer(cors_layer(config)).layer(security_headers);

    if config.is_production() {
        app.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ))
    } else {
        app
    }
}
