use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::ValidationErrors;

use care_hub_domain::services::Page;

use crate::entities::appointment::AppointmentResponse;
use crate::entities::consultation::ConsultationResponse;
use crate::entities::doctor::DoctorResponse;
use crate::entities::membership::OrderResponse;

/// Error response format for API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach machine-readable details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Create a not found error response
    pub fn not_found(resource: &str) -> Self {
        Self::new("not_found", format!("The requested {} could not be found", resource))
    }

    /// Create a validation error response
    pub fn validation_error(message: &str, details: Option<serde_json::Value>) -> Self {
        Self {
            details,
            ..Self::new("validation_error", message)
        }
    }

    /// Validation failure of a request body
    pub fn from_validation(errors: &ValidationErrors) -> Self {
        let message = care_hub_domain::services::validation_message(errors);
        Self::validation_error(&message, serde_json::to_value(errors).ok())
    }

    /// Create a bad request error response
    pub fn bad_request(message: &str) -> Self {
        Self::new("bad_request", message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new("unauthorized", message)
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new("forbidden", message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new("conflict", message)
    }

    pub fn too_many_requests(message: &str) -> Self {
        Self::new("too_many_requests", message)
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self::new("service_unavailable", message)
    }

    /// Create an internal error response
    pub fn internal_error() -> Self {
        Self::new("internal_error", "An unexpected error occurred")
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" | "bad_request" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "conflict" => StatusCode::CONFLICT,
            "too_many_requests" => StatusCode::TOO_MANY_REQUESTS,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Query parameters for paginated requests
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Number of results to return (default: 20, max: 100)
    #[param(minimum = 1, maximum = 100)]
    pub limit: Option<usize>,

    /// Number of results to skip (default: 0)
    #[param(minimum = 0)]
    pub offset: Option<usize>,
}

/// Paginated response format
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(
    DoctorPage = PaginatedResponse<DoctorResponse>,
    AppointmentPage = PaginatedResponse<AppointmentResponse>,
    ConsultationPage = PaginatedResponse<ConsultationResponse>,
    OrderPage = PaginatedResponse<OrderResponse>
)]
pub struct PaginatedResponse<T> {
    /// Total count of items available
    pub total_count: usize,

    /// Current offset
    pub offset: usize,

    /// Current limit
    pub limit: usize,

    /// URL for the next page (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// URL for the previous page (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,

    /// Actual data items
    pub data: Vec<T>,
}

impl<T> PaginatedResponse<T> {
    /// Build the response for a service page.
    ///
    /// `base_url` is the request path; `filters` are extra query pairs that
    /// must be repeated in the navigation links.
    pub fn from_page(page: Page<T>, base_url: &str, filters: &[(&str, Option<String>)]) -> Self {
        let (next, previous) = pagination_links(base_url, filters, page.total, page.limit, page.offset);
        Self {
            total_count: page.total,
            offset: page.offset,
            limit: page.limit,
            next,
            previous,
            data: page.items,
        }
    }
}

/// Next/previous links for an offset page
pub fn pagination_links(
    base_url: &str,
    filters: &[(&str, Option<String>)],
    total: usize,
    limit: usize,
    offset: usize,
) -> (Option<String>, Option<String>) {
    let link = |offset: usize| {
        let mut query: Vec<String> = filters
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|value| format!("{}={}", key, encode_query_value(value))))
            .collect();
        query.push(format!("limit={}", limit));
        query.push(format!("offset={}", offset));
        format!("{}?{}", base_url, query.join("&"))
    };

    let next = if offset + limit < total { Some(link(offset + limit)) } else { None };
    let previous = if offset > 0 { Some(link(offset.saturating_sub(limit))) } else { None };

    (next, previous)
}

/// Percent-encode everything outside the unreserved set
fn encode_query_value(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ErrorResponse::not_found("doctor").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorResponse::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorResponse::validation_error("x", None).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorResponse::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorResponse::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorResponse::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorResponse::too_many_requests("x").status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorResponse::service_unavailable("x").status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorResponse::internal_error().status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_omits_empty_details() {
        let body = serde_json::to_value(ErrorResponse::not_found("doctor")).unwrap();
        assert_eq!(body["error"], "not_found");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_pagination_links_middle_page() {
        let (next, previous) = pagination_links("/api/doctors", &[], 50, 10, 20);
        assert_eq!(next.as_deref(), Some("/api/doctors?limit=10&offset=30"));
        assert_eq!(previous.as_deref(), Some("/api/doctors?limit=10&offset=10"));
    }

    #[test]
    fn test_pagination_links_edges() {
        let (next, previous) = pagination_links("/api/doctors", &[], 15, 10, 0);
        assert!(next.is_some());
        assert!(previous.is_none());

        let (next, previous) = pagination_links("/api/doctors", &[], 15, 10, 10);
        assert!(next.is_none());
        assert_eq!(previous.as_deref(), Some("/api/doctors?limit=10&offset=0"));

        let (_, previous) = pagination_links("/api/doctors", &[], 15, 10, 5);
        assert_eq!(previous.as_deref(), Some("/api/doctors?limit=10&offset=0"));
    }

    #[test]
    fn test_pagination_links_keep_filters() {
        let filters = [("department", Some("儿科".to_string())), ("keyword", None)];
        let (next, _) = pagination_links("/api/doctors", &filters, 30, 10, 0);
        assert_eq!(
            next.as_deref(),
            Some("/api/doctors?department=%E5%84%BF%E7%A7%91&limit=10&offset=10")
        );
    }
}
