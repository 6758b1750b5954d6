use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use care_hub_domain::auth::UserInfo;

use crate::api::state::AppState;
use crate::entities::common::{ErrorResponse, OrderPage, PaginatedResponse, PaginationParams};
use crate::entities::membership::{
    CardResponse, CardsResponse, ConfirmPaymentResponse, CreateOrderRequest, OrderResponse, PlanResponse,
};

/// Plans currently on sale
#[utoipa::path(
    get,
    path = "/api/membership/plans",
    responses(
        (status = 200, description = "Active plans", body = [PlanResponse]),
    ),
    tag = "membership"
)]
#[instrument(skip(state))]
pub async fn list_plans(State(state): State<AppState>) -> Result<impl IntoResponse, ErrorResponse> {
    let plans: Vec<PlanResponse> = state
        .membership
        .list_plans()
        .await?
        .into_iter()
        .map(PlanResponse::from)
        .collect();
    Ok(Json(plans))
}

/// Open a pending order for a plan
#[utoipa::path(
    post,
    path = "/api/membership/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 404, description = "Unknown plan", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "membership"
)]
#[instrument(skip(state))]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    request.validate().map_err(|e| ErrorResponse::from_validation(&e))?;

    let order = state.membership.create_order(user.user_id, &request.plan_code).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(order))))
}

/// The caller's orders
#[utoipa::path(
    get,
    path = "/api/membership/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of orders", body = OrderPage),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "membership"
)]
#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let page = state
        .membership
        .list_orders(user.user_id, params.limit, params.offset)
        .await?
        .map(OrderResponse::from);

    Ok(Json(PaginatedResponse::from_page(page, "/api/membership/orders", &[])))
}

/// One of the caller's orders
#[utoipa::path(
    get,
    path = "/api/membership/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "membership"
)]
#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let order = state.membership.get_order(user.user_id, id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// Record payment for a pending order and issue its card
#[utoipa::path(
    post,
    path = "/api/membership/orders/{id}/confirm",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order paid, card issued", body = ConfirmPaymentResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Order is not pending", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "membership"
)]
#[instrument(skip(state))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let (order, card) = state.membership.confirm_payment(user.user_id, id).await?;
    info!("Order {} confirmed, card {} issued", order.order_no, card.card_no);

    Ok(Json(ConfirmPaymentResponse {
        order: OrderResponse::from(order),
        card: CardResponse::issued(card, Utc::now()),
    }))
}

/// Cancel a pending order
#[utoipa::path(
    post,
    path = "/api/membership/orders/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Order is not pending", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "membership"
)]
#[instrument(skip(state))]
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let order = state.membership.cancel_order(user.user_id, id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// The caller's membership cards
#[utoipa::path(
    get,
    path = "/api/membership/cards",
    responses(
        (status = 200, description = "Cards and current discount", body = CardsResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "membership"
)]
#[instrument(skip(state))]
pub async fn list_cards(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let now = Utc::now();
    let cards = state.membership.list_cards(user.user_id, now).await?;
    let current_discount_percent = state.membership.best_discount(user.user_id, now).await?;

    Ok(Json(CardsResponse {
        cards: cards.into_iter().map(CardResponse::from).collect(),
        current_discount_percent,
    }))
}
