use axum::{
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

use care_hub_domain::auth::{auth_middleware, configure_security, optional_auth_middleware, require_role};

use crate::api::handlers::{admin, appointments, auth, consultations, doctors, health, membership};
use crate::api::state::AppState;
use crate::openapi::configure_swagger_routes;

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    debug!("Creating application router");
    let tokens = state.tokens.clone();

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .layer(Extension(state.health.clone()));

    // Routes that don't require authentication
    let public_routes = Router::new()
        .route("/api/auth/sms/send", post(auth::send_sms_code))
        .route("/api/auth/sms/login", post(auth::sms_login))
        .route("/api/auth/wechat/login", post(auth::wechat_login))
        .route("/api/auth/refresh", post(auth::refresh_token))
        .route("/api/doctors", get(doctors::list_doctors))
        .route("/api/doctors/departments", get(doctors::list_departments))
        .route("/api/doctors/:id", get(doctors::get_doctor))
        .route("/api/membership/plans", get(membership::list_plans));

    debug!("Public routes configured");

    // Anonymous or signed-in
    let optional_auth_routes = Router::new()
        .route("/api/consultations", post(consultations::submit_consultation))
        .route_layer(middleware::from_fn_with_state(tokens.clone(), optional_auth_middleware));

    let authenticated_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route(
            "/api/appointments",
            get(appointments::list_my_appointments).post(appointments::book_appointment),
        )
        .route("/api/appointments/:id", get(appointments::get_my_appointment))
        .route("/api/appointments/:id/cancel", post(appointments::cancel_appointment))
        .route("/api/consultations/mine", get(consultations::list_my_consultations))
        .route(
            "/api/membership/orders",
            get(membership::list_orders).post(membership::create_order),
        )
        .route("/api/membership/orders/:id", get(membership::get_order))
        .route("/api/membership/orders/:id/confirm", post(membership::confirm_payment))
        .route("/api/membership/orders/:id/cancel", post(membership::cancel_order))
        .route("/api/membership/cards", get(membership::list_cards))
        .route_layer(middleware::from_fn_with_state(tokens.clone(), auth_middleware));

    debug!("Authenticated routes configured");

    let admin_routes = Router::new()
        .route("/api/admin/doctors", post(admin::create_doctor))
        .route("/api/admin/doctors/:id", put(admin::update_doctor))
        .route("/api/admin/appointments", get(admin::list_appointments))
        .route("/api/admin/appointments/:id/status", put(admin::update_appointment_status))
        .route("/api/admin/consultations", get(admin::list_consultations))
        .route("/api/admin/consultations/:id/reply", post(admin::reply_consultation))
        .route("/api/admin/consultations/:id/close", post(admin::close_consultation))
        .route_layer(middleware::from_fn(require_role("admin")))
        // Authentication must happen before authorization
        .route_layer(middleware::from_fn_with_state(tokens, auth_middleware));

    debug!("Admin routes configured");

    let app = Router::new()
        .merge(health_routes)
        .merge(public_routes)
        .merge(optional_auth_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        .merge(configure_swagger_routes())
        .layer(TraceLayer::new_for_http());

    debug!("Swagger UI merged");

    configure_security(app, &state.server)
}
