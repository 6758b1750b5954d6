//! Back-office endpoints; mounted behind `require_role("admin")`

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::{AppointmentStatus, ConsultationStatus};
use care_hub_domain::auth::UserInfo;

use crate::api::handlers::appointments::parse_status;
use crate::api::state::AppState;
use crate::entities::appointment::{AppointmentListParams, AppointmentResponse, UpdateAppointmentStatusRequest};
use crate::entities::common::{AppointmentPage, ConsultationPage, ErrorResponse, PaginatedResponse};
use crate::entities::consultation::{ConsultationListParams, ConsultationResponse, ReplyRequest};
use crate::entities::doctor::{CreateDoctorRequest, DoctorResponse, UpdateDoctorRequest};

/// Add a doctor
#[utoipa::path(
    post,
    path = "/api/admin/doctors",
    request_body = CreateDoctorRequest,
    responses(
        (status = 201, description = "Doctor created", body = DoctorResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "admin"
)]
#[instrument(skip(state, request))]
pub async fn create_doctor(
    State(state): State<AppState>,
    Extension(admin): Extension<UserInfo>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let doctor = state.doctors.create(request.into()).await?;
    info!("Admin {} created doctor {}", admin.user_id, doctor.id);

    Ok((StatusCode::CREATED, Json(DoctorResponse::from_doctor(doctor, &state.oss))))
}

/// Update a doctor, including hiding or republishing them
#[utoipa::path(
    put,
    path = "/api/admin/doctors/{id}",
    params(
        ("id" = Uuid, Path, description = "Doctor ID")
    ),
    request_body = UpdateDoctorRequest,
    responses(
        (status = 200, description = "Doctor updated", body = DoctorResponse),
        (status = 404, description = "Doctor not found", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "admin"
)]
#[instrument(skip(state, request))]
pub async fn update_doctor(
    State(state): State<AppState>,
    Extension(admin): Extension<UserInfo>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let doctor = state.doctors.update(id, request.into()).await?;
    info!("Admin {} updated doctor {}", admin.user_id, id);

    Ok(Json(DoctorResponse::from_doctor(doctor, &state.oss)))
}

/// All appointments, optionally by status
#[utoipa::path(
    get,
    path = "/api/admin/appointments",
    params(AppointmentListParams),
    responses(
        (status = 200, description = "Page of appointments", body = AppointmentPage),
        (status = 400, description = "Unknown status", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(params): Query<AppointmentListParams>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let status = parse_status(params.status.as_deref())?;
    let page = state
        .appointments
        .list_all(status, params.limit, params.offset)
        .await?
        .map(AppointmentResponse::from);

    Ok(Json(PaginatedResponse::from_page(
        page,
        "/api/admin/appointments",
        &[("status", status.map(|s| s.to_string()))],
    )))
}

/// Move an appointment through its workflow
#[utoipa::path(
    put,
    path = "/api/admin/appointments/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Appointment ID")
    ),
    request_body = UpdateAppointmentStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = AppointmentResponse),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn update_appointment_status(
    State(state): State<AppState>,
    Extension(admin): Extension<UserInfo>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;
    let status: AppointmentStatus = request.status.trim().parse()?;

    let appointment = state.appointments.update_status(id, status).await?;
    info!("Admin {} set appointment {} to {}", admin.user_id, id, status);

    Ok(Json(AppointmentResponse::from(appointment)))
}

/// All consultations, optionally by status
#[utoipa::path(
    get,
    path = "/api/admin/consultations",
    params(ConsultationListParams),
    responses(
        (status = 200, description = "Page of consultations", body = ConsultationPage),
        (status = 400, description = "Unknown status", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn list_consultations(
    State(state): State<AppState>,
    Query(params): Query<ConsultationListParams>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let status = match params.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => Some(value.parse::<ConsultationStatus>()?),
        None => None,
    };
    let page = state
        .consultations
        .list(status, params.limit, params.offset)
        .await?
        .map(ConsultationResponse::from);

    Ok(Json(PaginatedResponse::from_page(
        page,
        "/api/admin/consultations",
        &[("status", status.map(|s| s.to_string()))],
    )))
}

/// Answer a consultation
#[utoipa::path(
    post,
    path = "/api/admin/consultations/{id}/reply",
    params(
        ("id" = Uuid, Path, description = "Consultation ID")
    ),
    request_body = ReplyRequest,
    responses(
        (status = 200, description = "Reply recorded", body = ConsultationResponse),
        (status = 404, description = "Consultation not found", body = ErrorResponse),
        (status = 409, description = "Consultation is closed", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "admin"
)]
#[instrument(skip(state, request))]
pub async fn reply_consultation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplyRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let consultation = state.consultations.reply(id, &request.reply).await?;
    Ok(Json(ConsultationResponse::from(consultation)))
}

/// Close a consultation
#[utoipa::path(
    post,
    path = "/api/admin/consultations/{id}/close",
    params(
        ("id" = Uuid, Path, description = "Consultation ID")
    ),
    responses(
        (status = 200, description = "Consultation closed", body = ConsultationResponse),
        (status = 404, description = "Consultation not found", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn close_consultation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let consultation = state.consultations.close(id).await?;
    Ok(Json(ConsultationResponse::from(consultation)))
}
