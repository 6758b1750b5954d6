use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::logging::{log_access_denied, log_auth_event, AuthEvent, AuthEventType};
use crate::auth::UserInfo;

/// Let the request through only if the authenticated user holds one of
/// `required_roles`; 403 otherwise.
///
/// Must run after `auth_middleware`, which attaches the `UserInfo`.
pub async fn require_roles(req: Request<Body>, next: Next, required_roles: Vec<String>) -> Response {
    let request_path = req.uri().path().to_string();

    match req.extensions().get::<UserInfo>() {
        Some(user) => {
            if required_roles.iter().any(|role| user.has_role(role)) {
                debug!("User {} authorized for {}", user.user_id, request_path);
                next.run(req).await
            } else {
                warn!(
                    "User {} lacks required roles {:?} for {}",
                    user.user_id, required_roles, request_path
                );
                log_access_denied(&user.user_id.to_string(), &request_path, &required_roles);

                (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "error": "forbidden",
                        "message": "You don't have the required permissions to access this resource",
                        "details": { "required_roles": required_roles }
                    })),
                )
                    .into_response()
            }
        }
        None => {
            // auth_middleware did not run in front of this layer
            warn!("No user info found in request extensions for path: {}", request_path);

            let event = AuthEvent::new(AuthEventType::AccessDenied, None, false)
                .with_details("Authentication context missing in request extensions")
                .with_resource(request_path)
                .with_auth_method("rbac");
            log_auth_event(event);

            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "unauthorized",
                    "message": "Authentication required"
                })),
            )
                .into_response()
        }
    }
}

/// Middleware requiring a specific role, for `axum::middleware::from_fn`
///
/// ```ignore
/// let admin_routes = Router::new()
///     .route("/admin/doctors", post(create_doctor))
///     .layer(middleware::from_fn(require_role("admin")));
/// ```
pub fn require_role(
    role: &str,
) -> impl Fn(Request<Body>, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    require_any_role(&[role])
}

/// Middleware requiring any of several roles
pub fn require_any_role(
    roles: &[&str],
) -> impl Fn(Request<Body>, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    move |req, next| {
        let roles = roles.clone();
        Box::pin(async move { require_roles(req, next, roles).await })
    }
}
