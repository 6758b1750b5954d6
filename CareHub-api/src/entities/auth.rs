use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::User;
use care_hub_domain::auth::{LoginResult, SmsCodeSent, TokenPair};
use care_hub_domain::util::mask_phone;

/// Request an SMS verification code
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SendCodeRequest {
    /// Mainland mobile number, optionally prefixed with +86
    #[validate(length(min = 11, max = 16, message = "phone must be a mobile number"))]
    #[schema(example = "13812345678")]
    pub phone: String,
}

/// Code dispatch result
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendCodeResponse {
    /// Seconds until the code expires
    pub expires_in: i64,
    /// Seconds until another code may be requested
    pub resend_after: i64,
}

impl From<SmsCodeSent> for SendCodeResponse {
    fn from(sent: SmsCodeSent) -> Self {
        Self { expires_in: sent.expires_in, resend_after: sent.resend_after }
    }
}

/// Phone + code login payload
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SmsLoginRequest {
    #[validate(length(min = 11, max = 16, message = "phone must be a mobile number"))]
    #[schema(example = "13812345678")]
    pub phone: String,

    /// Code received by SMS
    #[validate(length(min = 4, max = 8, message = "code must be 4-8 digits"))]
    #[schema(example = "123456")]
    pub code: String,
}

/// Mini-program login payload
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct WeChatLoginRequest {
    /// Code returned by `wx.login()`
    #[validate(length(min = 1, max = 128, message = "code is required"))]
    pub code: String,

    /// Display name for first-time users
    #[validate(length(max = 50, message = "nickname must be at most 50 characters"))]
    pub nickname: Option<String>,
}

/// Refresh token exchange
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// Optional logout body
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Refresh token to revoke together with the access token
    pub refresh_token: Option<String>,
}

/// Token pair
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    pub access_token: String,

    /// JWT refresh token
    pub refresh_token: String,

    /// Token type (Bearer)
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: pair.expires_in,
        }
    }
}

/// Signed-in user as shown to the user themself
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,

    /// Masked phone number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    pub roles: Vec<String>,

    /// Whether a WeChat account is bound
    pub wechat_bound: bool,

    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.as_deref().map(mask_phone),
            nickname: user.nickname,
            roles: user.roles,
            wechat_bound: user.wechat_openid.is_some(),
            created_at: user.created_at,
        }
    }
}

/// Login response payload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// JWT access token
    pub access_token: String,

    /// JWT refresh token
    pub refresh_token: String,

    /// Token type (Bearer)
    pub token_type: String,

    /// Expiration time in seconds
    pub expires_in: i64,

    /// User information
    pub user: UserProfile,

    /// The account was created by this login
    pub is_new_user: bool,
}

impl From<LoginResult> for LoginResponse {
    fn from(result: LoginResult) -> Self {
        Self {
            access_token: result.tokens.access_token,
            refresh_token: result.tokens.refresh_token,
            token_type: result.tokens.token_type,
            expires_in: result.tokens.expires_in,
            user: result.user.into(),
            is_new_user: result.is_new_user,
        }
    }
}
