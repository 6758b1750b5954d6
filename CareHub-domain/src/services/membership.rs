use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use care_hub_data::models::{MembershipCard, MembershipPlan, NewMembershipCard, NewOrder, Order, OrderStatus};
use care_hub_data::repository::{MembershipRepositoryTrait, RepositoryError};

use crate::services::{page_request, Page};
use crate::util::{generate_card_no, generate_order_no};

/// Membership service errors
#[derive(Debug, Error)]
pub enum MembershipServiceError {
    /// Unknown or retired plan code
    #[error("Membership plan not found: {0}")]
    PlanNotFound(String),

    /// Unknown order, or an order of another user
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    /// The order is not pending
    #[error("Order {id} is {status}")]
    InvalidState { id: Uuid, status: OrderStatus },

    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<RepositoryError> for MembershipServiceError {
    fn from(err: RepositoryError) -> Self {
        error!("Membership repository error: {}", err);
        MembershipServiceError::Repository(err.to_string())
    }
}

/// A card together with whether it grants its discount right now
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub card: MembershipCard,
    pub is_active: bool,
}

/// Highest discount among cards valid at `at`; 0 without one
pub fn best_discount_from_cards(cards: &[MembershipCard], at: DateTime<Utc>) -> i32 {
    cards
        .iter()
        .filter(|card| card.is_valid_at(at))
        .map(|card| card.discount_percent)
        .max()
        .unwrap_or(0)
}

/// Trait for membership plans, orders and cards
#[async_trait]
pub trait MembershipServiceTrait: Send + Sync {
    /// Plans currently on sale
    async fn list_plans(&self) -> Result<Vec<MembershipPlan>, MembershipServiceError>;

    /// Open a pending order for the plan with `plan_code`
    async fn create_order(&self, user_id: Uuid, plan_code: &str) -> Result<Order, MembershipServiceError>;

    /// One of the user's orders
    async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, MembershipServiceError>;

    /// Mark a pending order paid and issue its card.
    ///
    /// The card starts when the user's latest card for the same plan ends, or
    /// now if there is none, and runs for the plan's duration.
    async fn confirm_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(Order, MembershipCard), MembershipServiceError>;

    /// Cancel a pending order
    async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, MembershipServiceError>;

    /// The user's orders, newest first
    async fn list_orders(
        &self,
        user_id: Uuid,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Order>, MembershipServiceError>;

    /// The user's cards, flagged active at `at`
    async fn list_cards(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<Vec<CardView>, MembershipServiceError>;

    /// Best discount percent the user holds at `at`
    async fn best_discount(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<i32, MembershipServiceError>;
}

/// Membership service
pub struct MembershipService<M: MembershipRepositoryTrait> {
    repository: M,
}

impl<M: MembershipRepositoryTrait + Send + Sync> MembershipService<M> {
    pub fn new(repository: M) -> Self {
        Self { repository }
    }

    async fn owned_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, MembershipServiceError> {
        match self.repository.get_order(order_id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(MembershipServiceError::OrderNotFound(order_id)),
        }
    }

    fn require_pending(order: &Order) -> Result<(), MembershipServiceError> {
        if order.status == OrderStatus::Pending {
            Ok(())
        } else {
            Err(MembershipServiceError::InvalidState { id: order.id, status: order.status })
        }
    }

    /// Repository conflicts mean the order left `pending` concurrently
    async fn conflict_to_state(&self, order_id: Uuid, err: RepositoryError) -> MembershipServiceError {
        match err {
            RepositoryError::Conflict(_) => match self.repository.get_order(order_id).await {
                Ok(Some(order)) => MembershipServiceError::InvalidState { id: order.id, status: order.status },
                _ => MembershipServiceError::OrderNotFound(order_id),
            },
            RepositoryError::NotFound(_) => MembershipServiceError::OrderNotFound(order_id),
            other => other.into(),
        }
    }
}

#[async_trait]
impl<M: MembershipRepositoryTrait + Send + Sync> MembershipServiceTrait for MembershipService<M> {
    async fn list_plans(&self) -> Result<Vec<MembershipPlan>, MembershipServiceError> {
        Ok(self.repository.list_plans(true).await?)
    }

    async fn create_order(&self, user_id: Uuid, plan_code: &str) -> Result<Order, MembershipServiceError> {
        let code = plan_code.trim().to_lowercase();
        let plan = match self.repository.get_plan_by_code(&code).await? {
            Some(plan) if plan.is_active => plan,
            _ => return Err(MembershipServiceError::PlanNotFound(plan_code.to_string())),
        };

        let order = self
            .repository
            .create_order(NewOrder {
                order_no: generate_order_no(Utc::now()),
                user_id,
                plan_id: plan.id,
                amount_cents: plan.price_cents,
            })
            .await?;

        info!("User {} opened order {} for plan {}", user_id, order.order_no, plan.code);
        Ok(order)
    }

    async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, MembershipServiceError> {
        self.owned_order(user_id, order_id).await
    }

    async fn confirm_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(Order, MembershipCard), MembershipServiceError> {
        let order = self.owned_order(user_id, order_id).await?;
        Self::require_pending(&order)?;

        let plan = self
            .repository
            .get_plan(order.plan_id)
            .await?
            .ok_or_else(|| MembershipServiceError::PlanNotFound(order.plan_id.to_string()))?;

        let now = Utc::now();
        let starts_at = match self.repository.latest_expiry(user_id, plan.id).await? {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        let card = NewMembershipCard {
            user_id,
            plan_id: plan.id,
            order_id: order.id,
            card_no: generate_card_no(),
            discount_percent: plan.discount_percent,
            starts_at,
            expires_at: starts_at + Duration::days(plan.duration_days as i64),
        };

        match self.repository.complete_order(order.id, now, card).await {
            Ok((order, card)) => {
                info!(
                    "Order {} paid; card {} valid {} to {}",
                    order.order_no, card.card_no, card.starts_at, card.expires_at
                );
                Ok((order, card))
            }
            Err(e) => {
                warn!("Could not complete order {}: {}", order_id, e);
                Err(self.conflict_to_state(order_id, e).await)
            }
        }
    }

    async fn cancel_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, MembershipServiceError> {
        let order = self.owned_order(user_id, order_id).await?;
        Self::require_pending(&order)?;

        match self.repository.cancel_order(order_id).await {
            Ok(order) => {
                info!("Order {} cancelled", order.order_no);
                Ok(order)
            }
            Err(e) => Err(self.conflict_to_state(order_id, e).await),
        }
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Order>, MembershipServiceError> {
        let page = page_request(limit, offset);
        let result = self.repository.list_orders_for_user(user_id, page).await?;
        Ok(Page::new(result, page))
    }

    async fn list_cards(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<Vec<CardView>, MembershipServiceError> {
        let cards = self.repository.list_cards_for_user(user_id).await?;
        Ok(cards
            .into_iter()
            .map(|card| CardView { is_active: card.is_valid_at(at), card })
            .collect())
    }

    async fn best_discount(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<i32, MembershipServiceError> {
        let cards = self.repository.list_cards_for_user(user_id).await?;
        Ok(best_discount_from_cards(&cards, at))
    }
}
