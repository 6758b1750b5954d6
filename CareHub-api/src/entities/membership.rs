use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::{MembershipCard, MembershipPlan, Order};
use care_hub_domain::services::CardView;
use care_hub_domain::util::format_price_cents;

/// Plan on sale
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    pub id: Uuid,
    /// Stable plan code used when ordering, e.g. monthly
    pub code: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    /// Formatted price, e.g. ¥29.00
    pub price: String,
    pub duration_days: i32,
    /// Discount on appointment fees while the card is valid
    pub discount_percent: i32,
}

impl From<MembershipPlan> for PlanResponse {
    fn from(plan: MembershipPlan) -> Self {
        Self {
            id: plan.id,
            code: plan.code,
            name: plan.name,
            description: plan.description,
            price: format_price_cents(plan.price_cents),
            price_cents: plan.price_cents,
            duration_days: plan.duration_days,
            discount_percent: plan.discount_percent,
        }
    }
}

/// Open an order for a plan
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 32, message = "plan_code is required"))]
    #[schema(example = "monthly")]
    pub plan_code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    /// CH + timestamp + 6 digits
    pub order_no: String,
    pub plan_id: Uuid,
    pub amount_cents: i64,
    /// Formatted amount
    pub amount: String,
    /// pending, paid or cancelled
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_no: order.order_no,
            plan_id: order.plan_id,
            amount: format_price_cents(order.amount_cents),
            amount_cents: order.amount_cents,
            status: order.status.to_string(),
            paid_at: order.paid_at,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardResponse {
    pub id: Uuid,
    pub card_no: String,
    pub plan_id: Uuid,
    pub order_id: Uuid,
    pub discount_percent: i32,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Valid right now
    pub is_active: bool,
}

impl CardResponse {
    fn new(card: MembershipCard, is_active: bool) -> Self {
        Self {
            id: card.id,
            card_no: card.card_no,
            plan_id: card.plan_id,
            order_id: card.order_id,
            discount_percent: card.discount_percent,
            starts_at: card.starts_at,
            expires_at: card.expires_at,
            is_active,
        }
    }

    /// Card issued by a payment just now
    pub fn issued(card: MembershipCard, now: DateTime<Utc>) -> Self {
        let is_active = card.is_valid_at(now);
        Self::new(card, is_active)
    }
}

impl From<CardView> for CardResponse {
    fn from(view: CardView) -> Self {
        Self::new(view.card, view.is_active)
    }
}

/// The user's cards and the discount they currently grant
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardsResponse {
    pub cards: Vec<CardResponse>,
    /// Best discount applied to new appointments
    pub current_discount_percent: i32,
}

/// Paid order with its card
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmPaymentResponse {
    pub order: OrderResponse,
    pub card: CardResponse,
}
