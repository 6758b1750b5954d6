use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::Appointment;
use care_hub_domain::services::BookAppointment;
use care_hub_domain::util::{format_china_time, format_price_cents, mask_phone};

/// Booking payload
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,

    /// RFC 3339 visit time; must be in the future and within 90 days
    pub scheduled_at: DateTime<Utc>,

    #[validate(length(min = 1, max = 50, message = "patient_name must be 1-50 characters"))]
    pub patient_name: String,

    #[validate(length(min = 11, max = 16, message = "patient_phone must be a mobile number"))]
    pub patient_phone: String,

    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

impl From<BookAppointmentRequest> for BookAppointment {
    fn from(req: BookAppointmentRequest) -> Self {
        BookAppointment {
            doctor_id: req.doctor_id,
            scheduled_at: req.scheduled_at,
            patient_name: req.patient_name,
            patient_phone: req.patient_phone,
            notes: req.notes,
        }
    }
}

/// Appointment as returned to its owner and to admins
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    /// Visit time in China Standard Time, e.g. 2024-03-01 09:30
    pub scheduled_at_local: String,
    /// pending, confirmed, completed or cancelled
    pub status: String,
    pub patient_name: String,
    /// Masked phone number
    pub patient_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Price after the membership discount
    pub price_cents: i64,
    /// Formatted price, e.g. ¥42.50
    pub price: String,
    pub discount_percent: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            user_id: appointment.user_id,
            doctor_id: appointment.doctor_id,
            scheduled_at_local: format_china_time(appointment.scheduled_at),
            scheduled_at: appointment.scheduled_at,
            status: appointment.status.to_string(),
            patient_name: appointment.patient_name,
            patient_phone: mask_phone(&appointment.patient_phone),
            notes: appointment.notes,
            price: format_price_cents(appointment.price_cents),
            price_cents: appointment.price_cents,
            discount_percent: appointment.discount_percent,
            created_at: appointment.created_at,
        }
    }
}

/// Query parameters for appointment listings
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AppointmentListParams {
    /// pending, confirmed, completed or cancelled
    pub status: Option<String>,
    /// Number of results to return (default: 20, max: 100)
    pub limit: Option<usize>,
    /// Number of results to skip (default: 0)
    pub offset: Option<usize>,
}

/// Admin status change
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAppointmentStatusRequest {
    /// confirmed, completed or cancelled
    #[validate(length(min = 1, message = "status is required"))]
    #[schema(example = "confirmed")]
    pub status: String,
}
