use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
}

/// Registers the JWT bearer scheme referenced by protected paths
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // Auth endpoints
        crate::api::handlers::auth::send_sms_code,
        crate::api::handlers::auth::sms_login,
        crate::api::handlers::auth::wechat_login,
        crate::api::handlers::auth::refresh_token,
        crate::api::handlers::auth::me,
        crate::api::handlers::auth::logout,

        // Doctor endpoints
        crate::api::handlers::doctors::list_doctors,
        crate::api::handlers::doctors::list_departments,
        crate::api::handlers::doctors::get_doctor,

        // Appointment endpoints
        crate::api::handlers::appointments::book_appointment,
        crate::api::handlers::appointments::list_my_appointments,
        crate::api::handlers::appointments::get_my_appointment,
        crate::api::handlers::appointments::cancel_appointment,

        // Consultation endpoints
        crate::api::handlers::consultations::submit_consultation,
        crate::api::handlers::consultations::list_my_consultations,

        // Membership endpoints
        crate::api::handlers::membership::list_plans,
        crate::api::handlers::membership::create_order,
        crate::api::handlers::membership::list_orders,
        crate::api::handlers::membership::get_order,
        crate::api::handlers::membership::confirm_payment,
        crate::api::handlers::membership::cancel_order,
        crate::api::handlers::membership::list_cards,

        // Admin endpoints
        crate::api::handlers::admin::create_doctor,
        crate::api::handlers::admin::update_doctor,
        crate::api::handlers::admin::list_appointments,
        crate::api::handlers::admin::update_appointment_status,
        crate::api::handlers::admin::list_consultations,
        crate::api::handlers::admin::reply_consultation,
        crate::api::handlers::admin::close_consultation
    ),
    components(
        schemas(
            // Common
            crate::entities::common::ErrorResponse,
            crate::entities::common::DoctorPage,
            crate::entities::common::AppointmentPage,
            crate::entities::common::ConsultationPage,
            crate::entities::common::OrderPage,

            // Health
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::ComponentStatus,
            crate::api::handlers::health::ComponentHealthStatus,

            // Auth
            crate::entities::auth::SendCodeRequest,
            crate::entities::auth::SendCodeResponse,
            crate::entities::auth::SmsLoginRequest,
            crate::entities::auth::WeChatLoginRequest,
            crate::entities::auth::RefreshRequest,
            crate::entities::auth::LogoutRequest,
            crate::entities::auth::TokenResponse,
            crate::entities::auth::UserProfile,
            crate::entities::auth::LoginResponse,

            // Doctors
            crate::entities::doctor::DoctorResponse,
            crate::entities::doctor::DepartmentsResponse,
            crate::entities::doctor::CreateDoctorRequest,
            crate::entities::doctor::UpdateDoctorRequest,

            // Appointments
            crate::entities::appointment::BookAppointmentRequest,
            crate::entities::appointment::AppointmentResponse,
            crate::entities::appointment::UpdateAppointmentStatusRequest,

            // Consultations
            crate::entities::consultation::SubmitConsultationRequest,
            crate::entities::consultation::ConsultationResponse,
            crate::entities::consultation::ReplyRequest,

            // Membership
            crate::entities::membership::PlanResponse,
            crate::entities::membership::CreateOrderRequest,
            crate::entities::membership::OrderResponse,
            crate::entities::membership::CardResponse,
            crate::entities::membership::CardsResponse,
            crate::entities::membership::ConfirmPaymentResponse
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "auth", description = "SMS and WeChat login, token refresh and logout"),
        (name = "doctors", description = "Doctor directory"),
        (name = "appointments", description = "Appointment booking for signed-in users"),
        (name = "consultations", description = "Consultation inquiries"),
        (name = "membership", description = "Membership plans, orders and cards"),
        (name = "admin", description = "Back-office management, admin role required")
    ),
    info(
        title = "CareHub API",
        version = "0.1.0",
        description = "Doctor directory, appointments, consultations and memberships",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_doc_generation() {
        let openapi = ApiDoc::openapi();

        assert_eq!(openapi.info.title, "CareHub API");
        assert_eq!(openapi.info.version, "0.1.0");

        let tags = openapi.tags.as_ref().unwrap();
        for name in ["health", "auth", "doctors", "appointments", "consultations", "membership", "admin"] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag {}", name);
        }

        let paths = &openapi.paths.paths;
        for path in [
            "/health",
            "/api/auth/sms/send",
            "/api/auth/sms/login",
            "/api/auth/wechat/login",
            "/api/auth/refresh",
            "/api/doctors",
            "/api/doctors/{id}",
            "/api/appointments",
            "/api/consultations",
            "/api/membership/orders/{id}/confirm",
            "/api/membership/cards",
            "/api/admin/consultations/{id}/reply",
        ] {
            assert!(paths.contains_key(path), "missing path {}", path);
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.unwrap();

        assert!(components.security_schemes.contains_key("bearer"));
        assert!(components.schemas.contains_key("DoctorPage"));
    }
}
