use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use care_hub_domain::services::DoctorQuery;

use crate::api::state::AppState;
use crate::entities::common::{DoctorPage, ErrorResponse, PaginatedResponse};
use crate::entities::doctor::{DepartmentsResponse, DoctorListParams, DoctorResponse};

/// List active doctors
#[utoipa::path(
    get,
    path = "/api/doctors",
    params(DoctorListParams),
    responses(
        (status = 200, description = "Page of doctors", body = DoctorPage),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "doctors"
)]
#[instrument(skip(state))]
pub async fn list_doctors(
    State(state): State<AppState>,
    Query(params): Query<DoctorListParams>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let page = state
        .doctors
        .list(DoctorQuery {
            department: params.department.clone(),
            keyword: params.keyword.clone(),
            limit: params.limit,
            offset: params.offset,
        })
        .await?;
    debug!("Returning {} of {} doctors", page.items.len(), page.total);

    let oss = &state.oss;
    let page = page.map(|doctor| DoctorResponse::from_doctor(doctor, oss));
    Ok(Json(PaginatedResponse::from_page(
        page,
        "/api/doctors",
        &[("department", params.department), ("keyword", params.keyword)],
    )))
}

/// Departments that currently have doctors
#[utoipa::path(
    get,
    path = "/api/doctors/departments",
    responses(
        (status = 200, description = "Department names", body = DepartmentsResponse),
    ),
    tag = "doctors"
)]
#[instrument(skip(state))]
pub async fn list_departments(State(state): State<AppState>) -> Result<impl IntoResponse, ErrorResponse> {
    let departments = state.doctors.list_departments().await?;
    Ok(Json(DepartmentsResponse { departments }))
}

/// Get a single doctor by ID
#[utoipa::path(
    get,
    path = "/api/doctors/{id}",
    params(
        ("id" = Uuid, Path, description = "Doctor ID")
    ),
    responses(
        (status = 200, description = "Doctor found", body = DoctorResponse),
        (status = 404, description = "Doctor not found", body = ErrorResponse),
    ),
    tag = "doctors"
)]
#[instrument(skip(state))]
pub async fn get_doctor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let doctor = state.doctors.get(id).await?;
    Ok(Json(DoctorResponse::from_doctor(doctor, &state.oss)))
}
