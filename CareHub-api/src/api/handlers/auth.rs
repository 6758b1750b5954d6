use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use tracing::{info, instrument};
use validator::Validate;

use care_hub_domain::auth::{Claims, UserInfo};
use care_hub_domain::util::mask_phone;

use crate::api::state::AppState;
use crate::entities::auth::{
    LoginResponse, LogoutRequest, RefreshRequest, SendCodeRequest, SendCodeResponse, SmsLoginRequest,
    TokenResponse, UserProfile, WeChatLoginRequest,
};
use crate::entities::common::ErrorResponse;

/// Send an SMS verification code
#[utoipa::path(
    post,
    path = "/api/auth/sms/send",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code sent", body = SendCodeResponse),
        (status = 400, description = "Invalid phone number", body = ErrorResponse),
        (status = 429, description = "Requested again too soon", body = ErrorResponse),
        (status = 503, description = "SMS gateway unavailable", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn send_sms_code(
    State(state): State<AppState>,
    Json(request): Json<SendCodeRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let sent = state.auth.send_sms_code(&request.phone).await?;
    info!("Verification code requested for {}", mask_phone(&request.phone));

    Ok((StatusCode::OK, Json(SendCodeResponse::from(sent))))
}

/// Sign in with phone and SMS code; unknown numbers are registered
#[utoipa::path(
    post,
    path = "/api/auth/sms/login",
    request_body = SmsLoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Wrong, expired or missing code", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn sms_login(
    State(state): State<AppState>,
    Json(request): Json<SmsLoginRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let result = state.auth.login_with_sms(&request.phone, &request.code).await?;
    Ok((StatusCode::OK, Json(LoginResponse::from(result))))
}

/// Sign in from the WeChat mini-program
#[utoipa::path(
    post,
    path = "/api/auth/wechat/login",
    request_body = WeChatLoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Login code rejected by WeChat", body = ErrorResponse),
        (status = 503, description = "WeChat login unavailable", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn wechat_login(
    State(state): State<AppState>,
    Json(request): Json<WeChatLoginRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let result = state
        .auth
        .login_with_wechat(&request.code, request.nickname.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(LoginResponse::from(result))))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Invalid, expired or revoked refresh token", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let pair = state.auth.refresh(&request.refresh_token).await?;
    Ok((StatusCode::OK, Json(TokenResponse::from(pair))))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Signed-in user", body = UserProfile),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "auth"
)]
#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let user = state.auth.current_user(user.user_id).await?;
    Ok(Json(UserProfile::from(user)))
}

/// Revoke the presented access token and optionally a refresh token
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body(content = LogoutRequest, description = "Optional; refresh token to revoke as well"),
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    state.auth.logout(&claims, request.refresh_token.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}
