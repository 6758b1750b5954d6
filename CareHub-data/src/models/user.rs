use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage model for a platform user.
///
/// A user signs in either by SMS (phone) or through the WeChat mini-program
/// (openid); both identifiers may end up on the same row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub phone: Option<String>,
    pub wechat_openid: Option<String>,
    pub nickname: Option<String>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Input data for creating a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub phone: Option<String>,
    pub wechat_openid: Option<String>,
    pub nickname: Option<String>,
    pub roles: Vec<String>,
}
