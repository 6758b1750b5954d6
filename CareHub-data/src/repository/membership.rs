use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::errors::RepositoryError;
use super::in_memory::InMemoryStore;
use crate::database::DatabasePool;
use crate::models::{MembershipCard, MembershipPlan, NewMembershipCard, NewOrder, Order, OrderStatus, PageRequest};

const PLAN_COLUMNS: &str = "id, code, name, description, price_cents, duration_days, discount_percent, is_active";
const ORDER_COLUMNS: &str = "id, order_no, user_id, plan_id, amount_cents, status, paid_at, created_at, updated_at";
const CARD_COLUMNS: &str =
    "id, user_id, plan_id, order_id, card_no, discount_percent, starts_at, expires_at, created_at";

/// The plans inserted by the seed migration, used to prime in-memory storage
pub fn seeded_plans() -> Vec<MembershipPlan> {
    let plan = |suffix: u128, code: &str, name: &str, price_cents: i64, duration_days: i32, discount_percent: i32| {
        MembershipPlan {
            id: Uuid::from_u128(0x6b1f3c0e_8d3a_4a52_9a51_0c4a2f1f0000 + suffix),
            code: code.to_string(),
            name: name.to_string(),
            description: format!("{} days of member pricing on appointments", duration_days),
            price_cents,
            duration_days,
            discount_percent,
            is_active: true,
        }
    };

    vec![
        plan(1, "monthly", "月度会员卡", 2900, 30, 10),
        plan(2, "quarterly", "季度会员卡", 7900, 90, 15),
        plan(3, "annual", "年度会员卡", 26800, 365, 20),
    ]
}

/// Repository trait for plans, orders and cards
#[async_trait]
pub trait MembershipRepositoryTrait {
    /// Plans ordered by price
    async fn list_plans(&self, active_only: bool) -> Result<Vec<MembershipPlan>, RepositoryError>;

    async fn get_plan(&self, id: Uuid) -> Result<Option<MembershipPlan>, RepositoryError>;

    async fn get_plan_by_code(&self, code: &str) -> Result<Option<MembershipPlan>, RepositoryError>;

    /// Insert a pending order
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// A user's orders, newest first
    async fn list_orders_for_user(&self, user_id: Uuid, page: PageRequest) -> Result<(Vec<Order>, usize), RepositoryError>;

    /// Cancel a pending order; `Conflict` for any other status
    async fn cancel_order(&self, id: Uuid) -> Result<Order, RepositoryError>;

    /// Mark a pending order paid and issue its card in one step
    async fn complete_order(
        &self,
        order_id: Uuid,
        paid_at: DateTime<Utc>,
        card: NewMembershipCard,
    ) -> Result<(Order, MembershipCard), RepositoryError>;

    /// Latest expiry among the user's cards for a plan
    async fn latest_expiry(&self, user_id: Uuid, plan_id: Uuid) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    /// A user's cards, latest expiry first
    async fn list_cards_for_user(&self, user_id: Uuid) -> Result<Vec<MembershipCard>, RepositoryError>;
}

/// Repository for membership plans, orders and cards
#[derive(Debug, Clone, Default)]
pub struct MembershipRepository {
    pool: Option<DatabasePool>,
    plans: InMemoryStore<MembershipPlan>,
    orders: InMemoryStore<Order>,
    cards: InMemoryStore<MembershipCard>,
}

impl MembershipRepository {
    /// Create a repository backed by the global pool when available
    pub fn new() -> Self {
        match super::detect_pool("membership") {
            Some(pool) => Self::with_pool(pool),
            None => Self::in_memory(),
        }
    }

    pub fn with_pool(pool: DatabasePool) -> Self {
        Self { pool: Some(pool), ..Default::default() }
    }

    /// In-memory repository primed with the seeded plans
    pub fn in_memory() -> Self {
        let repo = Self::default();
        for plan in seeded_plans() {
            // A fresh store cannot be poisoned
            let _ = repo.plans.insert(plan.id, plan);
        }
        repo
    }

    /// Mark an order paid only while it is still pending
    fn mark_paid(&self, order_id: Uuid, paid_at: DateTime<Utc>) -> Result<Order, RepositoryError> {
        let mut previous = None;
        let updated = self.orders.update(&order_id, |order| {
            previous = Some(order.status);
            if order.status == OrderStatus::Pending {
                order.status = OrderStatus::Paid;
                order.paid_at = Some(paid_at);
                order.updated_at = Utc::now();
            }
        })?;

        match (updated, previous) {
            (Some(order), Some(OrderStatus::Pending)) => Ok(order),
            (Some(_), Some(status)) => Err(RepositoryError::Conflict(format!("order {} is {}", order_id, status))),
            _ => Err(RepositoryError::NotFound(format!("order {}", order_id))),
        }
    }
}

#[async_trait]
impl MembershipRepositoryTrait for MembershipRepository {
    async fn list_plans(&self, active_only: bool) -> Result<Vec<MembershipPlan>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "SELECT {} FROM membership_plans WHERE (NOT $1 OR is_active) ORDER BY price_cents ASC",
                    PLAN_COLUMNS
                );
                Ok(sqlx::query_as::<_, MembershipPlan>(&sql).bind(active_only).fetch_all(pool).await?)
            }
            None => {
                let mut plans = self.plans.filter(|p| !active_only || p.is_active)?;
                plans.sort_by_key(|p| p.price_cents);
                Ok(plans)
            }
        }
    }

    async fn get_plan(&self, id: Uuid) -> Result<Option<MembershipPlan>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM membership_plans WHERE id = $1", PLAN_COLUMNS);
                Ok(sqlx::query_as::<_, MembershipPlan>(&sql).bind(id).fetch_optional(pool).await?)
            }
            None => self.plans.get(&id),
        }
    }

    async fn get_plan_by_code(&self, code: &str) -> Result<Option<MembershipPlan>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM membership_plans WHERE code = $1", PLAN_COLUMNS);
                Ok(sqlx::query_as::<_, MembershipPlan>(&sql).bind(code).fetch_optional(pool).await?)
            }
            None => self.plans.find(|p| p.code == code),
        }
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let id = Uuid::new_v4();
        debug!("Creating order {} ({})", order.order_no, id);

        match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "INSERT INTO orders (id, order_no, user_id, plan_id, amount_cents, status)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING {}",
                    ORDER_COLUMNS
                );
                Ok(sqlx::query_as::<_, Order>(&sql)
                    .bind(id)
                    .bind(&order.order_no)
                    .bind(order.user_id)
                    .bind(order.plan_id)
                    .bind(order.amount_cents)
                    .bind(OrderStatus::Pending.as_str())
                    .fetch_one(pool)
                    .await?)
            }
            None => {
                let now = Utc::now();
                let order_no = order.order_no.clone();
                let row = Order {
                    id,
                    order_no: order.order_no,
                    user_id: order.user_id,
                    plan_id: order.plan_id,
                    amount_cents: order.amount_cents,
                    status: OrderStatus::Pending,
                    paid_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.orders.insert_unless(id, row, |existing| existing.order_no == order_no)
            }
        }
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
                Ok(sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(pool).await?)
            }
            None => self.orders.get(&id),
        }
    }

    async fn list_orders_for_user(&self, user_id: Uuid, page: PageRequest) -> Result<(Vec<Order>, usize), RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_one(pool)
                    .await?;
                let sql = format!(
                    "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                    ORDER_COLUMNS
                );
                let orders = sqlx::query_as::<_, Order>(&sql)
                    .bind(user_id)
                    .bind(page.limit as i64)
                    .bind(page.offset as i64)
                    .fetch_all(pool)
                    .await?;
                Ok((orders, total.max(0) as usize))
            }
            None => {
                let mut orders = self.orders.filter(|o| o.user_id == user_id)?;
                orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(page.slice(orders))
            }
        }
    }

    async fn cancel_order(&self, id: Uuid) -> Result<Order, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "UPDATE orders SET status = $2, updated_at = NOW()
                     WHERE id = $1 AND status = $3
                     RETURNING {}",
                    ORDER_COLUMNS
                );
                let cancelled = sqlx::query_as::<_, Order>(&sql)
                    .bind(id)
                    .bind(OrderStatus::Cancelled.as_str())
                    .bind(OrderStatus::Pending.as_str())
                    .fetch_optional(pool)
                    .await?;

                match cancelled {
                    Some(order) => Ok(order),
                    None => match self.get_order(id).await? {
                        Some(order) => Err(RepositoryError::Conflict(format!("order {} is {}", id, order.status))),
                        None => Err(RepositoryError::NotFound(format!("order {}", id))),
                    },
                }
            }
            None => {
                let mut previous = None;
                let updated = self.orders.update(&id, |order| {
                    previous = Some(order.status);
                    if order.status == OrderStatus::Pending {
                        order.status = OrderStatus::Cancelled;
                        order.updated_at = Utc::now();
                    }
                })?;
                match (updated, previous) {
                    (Some(order), Some(OrderStatus::Pending)) => Ok(order),
                    (Some(_), Some(status)) => Err(RepositoryError::Conflict(format!("order {} is {}", id, status))),
                    _ => Err(RepositoryError::NotFound(format!("order {}", id))),
                }
            }
        }
    }

    async fn complete_order(
        &self,
        order_id: Uuid,
        paid_at: DateTime<Utc>,
        card: NewMembershipCard,
    ) -> Result<(Order, MembershipCard), RepositoryError> {
        let card_id = Uuid::new_v4();

        let result = match &self.pool {
            Some(pool) => {
                let mut tx = pool.begin().await?;

                let sql = format!(
                    "UPDATE orders SET status = $2, paid_at = $3, updated_at = NOW()
                     WHERE id = $1 AND status = $4
                     RETURNING {}",
                    ORDER_COLUMNS
                );
                let order = sqlx::query_as::<_, Order>(&sql)
                    .bind(order_id)
                    .bind(OrderStatus::Paid.as_str())
                    .bind(paid_at)
                    .bind(OrderStatus::Pending.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;

                let order = match order {
                    Some(order) => order,
                    None => {
                        tx.rollback().await?;
                        return match self.get_order(order_id).await? {
                            Some(existing) => Err(RepositoryError::Conflict(format!(
                                "order {} is {}",
                                order_id, existing.status
                            ))),
                            None => Err(RepositoryError::NotFound(format!("order {}", order_id))),
                        };
                    }
                };

                let sql = format!(
                    "INSERT INTO membership_cards
                     (id, user_id, plan_id, order_id, card_no, discount_percent, starts_at, expires_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                     RETURNING {}",
                    CARD_COLUMNS
                );
                let issued = sqlx::query_as::<_, MembershipCard>(&sql)
                    .bind(card_id)
                    .bind(card.user_id)
                    .bind(card.plan_id)
                    .bind(card.order_id)
                    .bind(&card.card_no)
                    .bind(card.discount_percent)
                    .bind(card.starts_at)
                    .bind(card.expires_at)
                    .fetch_one(&mut *tx)
                    .await?;

                tx.commit().await?;
                (order, issued)
            }
            None => {
                let order = self.mark_paid(order_id, paid_at)?;
                let issued = MembershipCard {
                    id: card_id,
                    user_id: card.user_id,
                    plan_id: card.plan_id,
                    order_id: card.order_id,
                    card_no: card.card_no,
                    discount_percent: card.discount_percent,
                    starts_at: card.starts_at,
                    expires_at: card.expires_at,
                    created_at: Utc::now(),
                };
                let issued = self.cards.insert(card_id, issued)?;
                (order, issued)
            }
        };

        info!("Order {} paid, issued card {}", result.0.order_no, result.1.card_no);
        Ok(result)
    }

    async fn latest_expiry(&self, user_id: Uuid, plan_id: Uuid) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        match &self.pool {
            Some(pool) => Ok(sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
                "SELECT MAX(expires_at) FROM membership_cards WHERE user_id = $1 AND plan_id = $2",
            )
            .bind(user_id)
            .bind(plan_id)
            .fetch_one(pool)
            .await?),
            None => Ok(self
                .cards
                .filter(|c| c.user_id == user_id && c.plan_id == plan_id)?
                .into_iter()
                .map(|c| c.expires_at)
                .max()),
        }
    }

    async fn list_cards_for_user(&self, user_id: Uuid) -> Result<Vec<MembershipCard>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "SELECT {} FROM membership_cards WHERE user_id = $1 ORDER BY expires_at DESC",
                    CARD_COLUMNS
                );
                Ok(sqlx::query_as::<_, MembershipCard>(&sql).bind(user_id).fetch_all(pool).await?)
            }
            None => {
                let mut cards = self.cards.filter(|c| c.user_id == user_id)?;
                cards.sort_by(|a, b| b.expires_at.cmp(&a.expires_at));
                Ok(cards)
            }
        }
    }
}
