use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use tracing::{info, instrument};
use validator::Validate;

use care_hub_domain::auth::UserInfo;

use crate::api::state::AppState;
use crate::entities::common::{ConsultationPage, ErrorResponse, PaginatedResponse, PaginationParams};
use crate::entities::consultation::{ConsultationResponse, SubmitConsultationRequest};

/// Submit an inquiry; signed-in users get it linked to their account
#[utoipa::path(
    post,
    path = "/api/consultations",
    request_body = SubmitConsultationRequest,
    responses(
        (status = 201, description = "Consultation recorded", body = ConsultationResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    security(
        (),
        ("bearer" = [])
    ),
    tag = "consultations"
)]
#[instrument(skip(state, request))]
pub async fn submit_consultation(
    State(state): State<AppState>,
    user: Option<Extension<UserInfo>>,
    Json(request): Json<SubmitConsultationRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let user_id = user.map(|Extension(user)| user.user_id);
    let consultation = state.consultations.submit(user_id, request.into()).await?;
    info!(
        "Consultation {} submitted ({})",
        consultation.id,
        if user_id.is_some() { "signed in" } else { "anonymous" }
    );

    Ok((StatusCode::CREATED, Json(ConsultationResponse::from(consultation))))
}

/// The caller's consultations
#[utoipa::path(
    get,
    path = "/api/consultations/mine",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of consultations", body = ConsultationPage),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "consultations"
)]
#[instrument(skip(state))]
pub async fn list_my_consultations(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let page = state
        .consultations
        .list_mine(user.user_id, params.limit, params.offset)
        .await?
        .map(ConsultationResponse::from);

    Ok(Json(PaginatedResponse::from_page(page, "/api/consultations/mine", &[])))
}
