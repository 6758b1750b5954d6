//! Login flows: SMS one-time passwords and WeChat mini-program codes

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use care_hub_data::models::{NewUser, User};
use care_hub_data::repository::{RepositoryError, UserRepositoryTrait};

use crate::auth::logging::{
    log_auth_event, log_failed_login, log_logout, log_successful_login, log_token_refresh, AuthEvent,
    AuthEventType,
};
use crate::auth::otp::{OtpError, OtpPolicy, OtpStore};
use crate::auth::sms::{SmsError, SmsSender};
use crate::auth::token::{Claims, SecurityError, TokenPair, TokenService, TokenType};
use crate::auth::wechat::{WeChatClient, WeChatError};
use crate::util::{is_valid_phone, mask_phone, normalize_phone};

/// Auth service errors
#[derive(Debug, Error)]
pub enum AuthServiceError {
    /// Not a mainland mobile number
    #[error("Invalid phone number")]
    InvalidPhone,

    /// Request field failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Sms(#[from] SmsError),

    #[error(transparent)]
    WeChat(#[from] WeChatError),

    #[error(transparent)]
    Token(#[from] SecurityError),

    /// Token subject no longer exists
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<RepositoryError> for AuthServiceError {
    fn from(err: RepositoryError) -> Self {
        AuthServiceError::Repository(err.to_string())
    }
}

/// Result of requesting an SMS code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsCodeSent {
    /// Seconds until the code expires
    pub expires_in: i64,
    /// Seconds until another code may be requested
    pub resend_after: i64,
}

/// Tokens plus the signed-in user
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub tokens: TokenPair,
    pub user: User,
    /// The account was created by this login
    pub is_new_user: bool,
}

/// Authentication operations used by the HTTP layer
#[async_trait]
pub trait AuthServiceTrait: Send + Sync {
    /// Send a verification code to a phone
    async fn send_sms_code(&self, phone: &str) -> Result<SmsCodeSent, AuthServiceError>;

    /// Sign in (or sign up) with phone + verification code
    async fn login_with_sms(&self, phone: &str, code: &str) -> Result<LoginResult, AuthServiceError>;

    /// Sign in (or sign up) with a mini-program login code
    async fn login_with_wechat(&self, code: &str, nickname: Option<&str>) -> Result<LoginResult, AuthServiceError>;

    /// Exchange a refresh token for a new pair; the old refresh token is revoked
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthServiceError>;

    /// Revoke the presented access token and, if given, the refresh token
    async fn logout(&self, claims: &Claims, refresh_token: Option<&str>) -> Result<(), AuthServiceError>;

    /// Load the signed-in user
    async fn current_user(&self, user_id: Uuid) -> Result<User, AuthServiceError>;

    /// Token service used to validate bearer tokens
    fn tokens(&self) -> &TokenService;
}

/// Default authentication service
pub struct AuthService<U: UserRepositoryTrait> {
    users: U,
    tokens: TokenService,
    otp: OtpStore,
    sms: Arc<dyn SmsSender>,
    wechat: Arc<dyn WeChatClient>,
}

impl<U: UserRepositoryTrait + Send + Sync> AuthService<U> {
    pub fn new(
        users: U,
        tokens: TokenService,
        otp_policy: OtpPolicy,
        sms: Arc<dyn SmsSender>,
        wechat: Arc<dyn WeChatClient>,
    ) -> Self {
        Self {
            users,
            tokens,
            otp: OtpStore::new(otp_policy),
            sms,
            wechat,
        }
    }

    fn parse_phone(raw: &str) -> Result<String, AuthServiceError> {
        let phone = normalize_phone(raw);
        if is_valid_phone(&phone) {
            Ok(phone)
        } else {
            Err(AuthServiceError::InvalidPhone)
        }
    }

    /// Find by phone, or create; a concurrent create is resolved by re-reading
    async fn find_or_create_by_phone(&self, phone: &str) -> Result<(User, bool), AuthServiceError> {
        if let Some(user) = self.users.find_by_phone(phone).await? {
            return Ok((user, false));
        }

        let new_user = NewUser { phone: Some(phone.to_string()), ..Default::default() };
        match self.users.create(new_user).await {
            Ok(user) => Ok((user, true)),
            Err(RepositoryError::Conflict(_)) => match self.users.find_by_phone(phone).await? {
                Some(user) => Ok((user, false)),
                None => Err(AuthServiceError::Repository(format!("user for {} vanished", mask_phone(phone)))),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn find_or_create_by_openid(
        &self,
        openid: &str,
        nickname: Option<&str>,
    ) -> Result<(User, bool), AuthServiceError> {
        if let Some(user) = self.users.find_by_openid(openid).await? {
            // Fill in a nickname the first time the client supplies one
            return match (nickname, &user.nickname) {
                (Some(name), None) => Ok((self.users.update_nickname(user.id, name).await?, false)),
                _ => Ok((user, false)),
            };
        }

        let new_user = NewUser {
            wechat_openid: Some(openid.to_string()),
            nickname: nickname.map(String::from),
            ..Default::default()
        };
        match self.users.create(new_user).await {
            Ok(user) => Ok((user, true)),
            Err(RepositoryError::Conflict(_)) => match self.users.find_by_openid(openid).await? {
                Some(user) => Ok((user, false)),
                None => Err(AuthServiceError::Repository("wechat user vanished".to_string())),
            },
            Err(e) => Err(e.into()),
        }
    }

    fn login_result(&self, user: User, is_new_user: bool, method: &str) -> Result<LoginResult, AuthServiceError> {
        let tokens = self.tokens.issue_pair(user.id, &user.roles)?;

        if is_new_user {
            log_auth_event(
                AuthEvent::new(AuthEventType::Registration, Some(&user.id.to_string()), true).with_auth_method(method),
            );
        }
        log_successful_login(&user.id.to_string(), method);

        Ok(LoginResult { tokens, user, is_new_user })
    }
}

#[async_trait]
impl<U: UserRepositoryTrait + Send + Sync> AuthServiceTrait for AuthService<U> {
    async fn send_sms_code(&self, phone: &str) -> Result<SmsCodeSent, AuthServiceError> {
        let phone = Self::parse_phone(phone)?;
        let masked = mask_phone(&phone);

        let issued = match self.otp.issue(&phone, Utc::now()) {
            Ok(issued) => issued,
            Err(e) => {
                warn!("Verification code for {} refused: {}", masked, e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.sms.send_code(&phone, &issued.code).await {
            error!("Failed to deliver verification code to {}: {}", masked, e);
            // Let the user retry immediately
            self.otp.discard(&phone);
            return Err(e.into());
        }

        log_auth_event(
            AuthEvent::new(AuthEventType::CodeRequested, Some(&masked), true).with_auth_method("sms"),
        );

        Ok(SmsCodeSent { expires_in: issued.expires_in, resend_after: issued.resend_after })
    }

    async fn login_with_sms(&self, phone: &str, code: &str) -> Result<LoginResult, AuthServiceError> {
        let phone = Self::parse_phone(phone)?;
        let masked = mask_phone(&phone);

        if let Err(e) = self.otp.verify(&phone, code, Utc::now()) {
            log_failed_login(&masked, "sms", &e.to_string());
            return Err(e.into());
        }

        let (user, is_new_user) = self.find_or_create_by_phone(&phone).await?;
        info!("SMS login for {} as user {}", masked, user.id);
        self.login_result(user, is_new_user, "sms")
    }

    async fn login_with_wechat(&self, code: &str, nickname: Option<&str>) -> Result<LoginResult, AuthServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthServiceError::Validation("code must not be empty".to_string()));
        }
        let nickname = nickname.map(str::trim).filter(|n| !n.is_empty());

        let session = match self.wechat.code_to_session(code).await {
            Ok(session) => session,
            Err(e) => {
                log_failed_login("wechat", "wechat", &e.to_string());
                return Err(e.into());
            }
        };

        let (user, is_new_user) = self.find_or_create_by_openid(&session.openid, nickname).await?;
        info!("WeChat login as user {}", user.id);
        self.login_result(user, is_new_user, "wechat")
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthServiceError> {
        let start_time = Instant::now();

        let claims = match self.tokens.validate_token(refresh_token, TokenType::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                log_auth_event(
                    AuthEvent::new(AuthEventType::TokenRefresh, None, false)
                        .with_details(format!("Invalid or expired refresh token: {}", e))
                        .with_duration(start_time.elapsed().as_millis() as u64)
                        .with_auth_method("refresh_token"),
                );
                return Err(e.into());
            }
        };

        let user_id = claims.user_id()?;
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound(user_id))?;

        // Rotate: the presented refresh token cannot be used again, and only
        // the first of two concurrent refreshes wins the revocation
        if !self.tokens.revoke(&claims) {
            log_token_refresh(&claims.sub, false, Some("refresh token already used"));
            return Err(SecurityError::TokenRevoked.into());
        }
        let pair = self.tokens.issue_pair(user.id, &user.roles)?;

        log_token_refresh(&claims.sub, true, None);
        Ok(pair)
    }

    async fn logout(&self, claims: &Claims, refresh_token: Option<&str>) -> Result<(), AuthServiceError> {
        self.tokens.revoke(claims);

        if let Some(token) = refresh_token {
            match self.tokens.validate_token(token, TokenType::Refresh) {
                Ok(refresh) if refresh.sub == claims.sub => {
                    self.tokens.revoke(&refresh);
                }
                Ok(_) => warn!("Ignoring refresh token of another user at logout"),
                Err(e) => warn!("Ignoring invalid refresh token at logout: {}", e),
            }
        }

        log_logout(&claims.sub);
        Ok(())
    }

    async fn current_user(&self, user_id: Uuid) -> Result<User, AuthServiceError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound(user_id))
    }

    fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}
