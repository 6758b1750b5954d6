use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::AppointmentStatus;
use care_hub_domain::auth::UserInfo;

use crate::api::state::AppState;
use crate::entities::appointment::{AppointmentListParams, AppointmentResponse, BookAppointmentRequest};
use crate::entities::common::{AppointmentPage, ErrorResponse, PaginatedResponse};

/// Parse an optional `status` query value
pub(crate) fn parse_status(raw: Option<&str>) -> Result<Option<AppointmentStatus>, ErrorResponse> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => Ok(Some(value.parse::<AppointmentStatus>()?)),
        None => Ok(None),
    }
}

/// Book an appointment with a doctor
#[utoipa::path(
    post,
    path = "/api/appointments",
    request_body = BookAppointmentRequest,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Doctor not found", body = ErrorResponse),
        (status = 409, description = "Time slot already booked", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "appointments"
)]
#[instrument(skip(state, request))]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let appointment = state.appointments.book(user.user_id, request.into()).await?;
    info!("Appointment {} booked by {}", appointment.id, user.user_id);

    Ok((StatusCode::CREATED, Json(AppointmentResponse::from(appointment))))
}

/// The caller's appointments
#[utoipa::path(
    get,
    path = "/api/appointments",
    params(AppointmentListParams),
    responses(
        (status = 200, description = "Page of appointments", body = AppointmentPage),
        (status = 400, description = "Unknown status", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "appointments"
)]
#[instrument(skip(state))]
pub async fn list_my_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(params): Query<AppointmentListParams>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let status = parse_status(params.status.as_deref())?;
    let page = state
        .appointments
        .list_mine(user.user_id, status, params.limit, params.offset)
        .await?
        .map(AppointmentResponse::from);

    Ok(Json(PaginatedResponse::from_page(
        page,
        "/api/appointments",
        &[("status", status.map(|s| s.to_string()))],
    )))
}

/// One of the caller's appointments
#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    params(
        ("id" = Uuid, Path, description = "Appointment ID")
    ),
    responses(
        (status = 200, description = "Appointment found", body = AppointmentResponse),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "appointments"
)]
#[instrument(skip(state))]
pub async fn get_my_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let appointment = state.appointments.get_mine(user.user_id, id).await?;
    Ok(Json(AppointmentResponse::from(appointment)))
}

/// Cancel a pending or confirmed appointment
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Appointment ID")
    ),
    responses(
        (status = 200, description = "Appointment cancelled", body = AppointmentResponse),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
        (status = 409, description = "Appointment can no longer be cancelled", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "appointments"
)]
#[instrument(skip(state))]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let appointment = state.appointments.cancel(user.user_id, id).await?;
    info!("Appointment {} cancelled by owner", id);
    Ok(Json(AppointmentResponse::from(appointment)))
}
