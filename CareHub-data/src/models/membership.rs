use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownStatus;

/// A purchasable membership card type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct MembershipPlan {
    pub id: Uuid,
    /// Stable identifier used by clients (e.g. "annual")
    pub code: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub duration_days: i32,
    /// Discount on appointment fees while a card of this plan is valid
    pub discount_percent: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(UnknownStatus { kind: "order", value: s.to_string() }),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Purchase of a membership plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_no: String,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_no: String,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub amount_cents: i64,
}

/// Entitlement issued once an order is paid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct MembershipCard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub order_id: Uuid,
    pub card_no: String,
    pub discount_percent: i32,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl MembershipCard {
    /// Valid at the given instant (start inclusive, expiry exclusive)
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMembershipCard {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub order_id: Uuid,
    pub card_no: String,
    pub discount_percent: i32,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
