//! Service errors to HTTP error bodies.
//!
//! Repository and transport failures are logged here and surface as a bare
//! `internal_error` or `service_unavailable`.

use serde_json::json;
use tracing::{error, warn};

use care_hub_data::models::UnknownStatus;
use care_hub_domain::auth::{AuthServiceError, OtpError, WeChatError};
use care_hub_domain::services::{
    AppointmentServiceError, ConsultationServiceError, DoctorServiceError, MembershipServiceError,
};

use crate::entities::common::ErrorResponse;

impl From<AuthServiceError> for ErrorResponse {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidPhone => ErrorResponse::validation_error(
                "phone must be a mainland mobile number",
                None,
            ),
            AuthServiceError::Validation(msg) => ErrorResponse::validation_error(&msg, None),
            AuthServiceError::Otp(e @ OtpError::Cooldown { retry_after }) => {
                ErrorResponse::too_many_requests(&e.to_string()).with_details(json!({ "retry_after": retry_after }))
            }
            AuthServiceError::Otp(OtpError::Mismatch { remaining }) => {
                ErrorResponse::unauthorized("Incorrect verification code")
                    .with_details(json!({ "remaining_attempts": remaining }))
            }
            AuthServiceError::Otp(otp) => ErrorResponse::unauthorized(&otp.to_string()),
            AuthServiceError::Sms(e) => {
                error!("SMS delivery failed: {}", e);
                ErrorResponse::service_unavailable("Verification code could not be sent, try again later")
            }
            AuthServiceError::WeChat(WeChatError::InvalidCode(_)) => {
                ErrorResponse::unauthorized("Invalid WeChat login code")
            }
            AuthServiceError::WeChat(WeChatError::RateLimited) => {
                ErrorResponse::too_many_requests("WeChat login is busy, try again later")
            }
            AuthServiceError::WeChat(WeChatError::NotConfigured) => {
                ErrorResponse::service_unavailable("WeChat login is not available")
            }
            AuthServiceError::WeChat(e) => {
                error!("WeChat login failed: {}", e);
                ErrorResponse::service_unavailable("WeChat login is not available")
            }
            AuthServiceError::Token(e) => {
                warn!("Token rejected: {}", e);
                ErrorResponse::unauthorized("Invalid or expired token")
            }
            AuthServiceError::UserNotFound(_) => ErrorResponse::unauthorized("Account no longer exists"),
            AuthServiceError::Repository(msg) => {
                error!("Auth repository error: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

impl From<DoctorServiceError> for ErrorResponse {
    fn from(err: DoctorServiceError) -> Self {
        match err {
            DoctorServiceError::Validation(msg) => ErrorResponse::validation_error(&msg, None),
            DoctorServiceError::NotFound(_) => ErrorResponse::not_found("doctor"),
            DoctorServiceError::Repository(msg) => {
                error!("Doctor repository error: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

impl From<AppointmentServiceError> for ErrorResponse {
    fn from(err: AppointmentServiceError) -> Self {
        match err {
            AppointmentServiceError::Validation(msg) => ErrorResponse::validation_error(&msg, None),
            AppointmentServiceError::DoctorNotFound(_) => ErrorResponse::not_found("doctor"),
            AppointmentServiceError::NotFound(_) => ErrorResponse::not_found("appointment"),
            AppointmentServiceError::SlotTaken => {
                ErrorResponse::conflict("The requested time slot is already booked")
            }
            e @ AppointmentServiceError::InvalidTransition { .. } => ErrorResponse::conflict(&e.to_string()),
            AppointmentServiceError::Repository(msg) => {
                error!("Appointment repository error: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

impl From<ConsultationServiceError> for ErrorResponse {
    fn from(err: ConsultationServiceError) -> Self {
        match err {
            ConsultationServiceError::Validation(msg) => ErrorResponse::validation_error(&msg, None),
            ConsultationServiceError::NotFound(_) => ErrorResponse::not_found("consultation"),
            ConsultationServiceError::Closed(_) => ErrorResponse::conflict("Consultation is closed"),
            ConsultationServiceError::Repository(msg) => {
                error!("Consultation repository error: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

impl From<MembershipServiceError> for ErrorResponse {
    fn from(err: MembershipServiceError) -> Self {
        match err {
            MembershipServiceError::PlanNotFound(_) => ErrorResponse::not_found("membership plan"),
            MembershipServiceError::OrderNotFound(_) => ErrorResponse::not_found("order"),
            e @ MembershipServiceError::InvalidState { .. } => ErrorResponse::conflict(&e.to_string()),
            MembershipServiceError::Repository(msg) => {
                error!("Membership repository error: {}", msg);
                ErrorResponse::internal_error()
            }
        }
    }
}

/// Unparsable `status` filter or body value
impl From<UnknownStatus> for ErrorResponse {
    fn from(err: UnknownStatus) -> Self {
        ErrorResponse::bad_request(&err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use care_hub_data::models::AppointmentStatus;
    use care_hub_domain::auth::{SecurityError, SmsError};
    use uuid::Uuid;

    #[test]
    fn test_auth_error_statuses() {
        let cooldown: ErrorResponse = AuthServiceError::Otp(OtpError::Cooldown { retry_after: 42 }).into();
        assert_eq!(cooldown.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(cooldown.details.unwrap()["retry_after"], 42);

        let mismatch: ErrorResponse = AuthServiceError::Otp(OtpError::Mismatch { remaining: 2 }).into();
        assert_eq!(mismatch.status_code(), StatusCode::UNAUTHORIZED);

        let sms: ErrorResponse = AuthServiceError::Sms(SmsError::Rejected("down".into())).into();
        assert_eq!(sms.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!sms.message.contains("down"));

        let token: ErrorResponse = AuthServiceError::Token(SecurityError::TokenExpired).into();
        assert_eq!(token.status_code(), StatusCode::UNAUTHORIZED);

        let phone: ErrorResponse = AuthServiceError::InvalidPhone.into();
        assert_eq!(phone.status_code(), StatusCode::BAD_REQUEST);

        let wechat: ErrorResponse = AuthServiceError::WeChat(WeChatError::NotConfigured).into();
        assert_eq!(wechat.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_repository_details_are_hidden() {
        let response: ErrorResponse = DoctorServiceError::Repository("connection refused at 10.0.0.5".into()).into();
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.message, "An unexpected error occurred");
    }

    #[test]
    fn test_conflicts() {
        let slot: ErrorResponse = AppointmentServiceError::SlotTaken.into();
        assert_eq!(slot.status_code(), StatusCode::CONFLICT);

        let transition: ErrorResponse = AppointmentServiceError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Pending,
        }
        .into();
        assert_eq!(transition.status_code(), StatusCode::CONFLICT);

        let closed: ErrorResponse = ConsultationServiceError::Closed(Uuid::new_v4()).into();
        assert_eq!(closed.status_code(), StatusCode::CONFLICT);
    }
}
