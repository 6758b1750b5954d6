use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::errors::RepositoryError;
use super::in_memory::InMemoryStore;
use crate::database::DatabasePool;
use crate::models::{NewUser, User};

const USER_COLUMNS: &str = "id, phone, wechat_openid, nickname, roles, created_at, updated_at";

/// Repository trait for platform users
#[async_trait]
pub trait UserRepositoryTrait {
    /// Look up a user by normalized mobile number
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, RepositoryError>;

    /// Look up a user by WeChat openid
    async fn find_by_openid(&self, openid: &str) -> Result<Option<User>, RepositoryError>;

    /// Get a user by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Create a user
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Change the display nickname
    async fn update_nickname(&self, id: Uuid, nickname: &str) -> Result<User, RepositoryError>;
}

/// Repository for users
#[derive(Debug, Clone, Default)]
pub struct UserRepository {
    pool: Option<DatabasePool>,
    storage: InMemoryStore<User>,
}

impl UserRepository {
    /// Create a repository backed by the global pool when available
    pub fn new() -> Self {
        Self {
            pool: super::detect_pool("user"),
            storage: InMemoryStore::new(),
        }
    }

    pub fn with_pool(pool: DatabasePool) -> Self {
        Self { pool: Some(pool), storage: InMemoryStore::new() }
    }

    /// Create a repository that never touches the database
    pub fn in_memory() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM users WHERE phone = $1", USER_COLUMNS);
                Ok(sqlx::query_as::<_, User>(&sql).bind(phone).fetch_optional(pool).await?)
            }
            None => self.storage.find(|u| u.phone.as_deref() == Some(phone)),
        }
    }

    async fn find_by_openid(&self, openid: &str) -> Result<Option<User>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM users WHERE wechat_openid = $1", USER_COLUMNS);
                Ok(sqlx::query_as::<_, User>(&sql).bind(openid).fetch_optional(pool).await?)
            }
            None => self.storage.find(|u| u.wechat_openid.as_deref() == Some(openid)),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
                Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(pool).await?)
            }
            None => self.storage.get(&id),
        }
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let id = Uuid::new_v4();
        let roles = if user.roles.is_empty() { vec!["user".to_string()] } else { user.roles };
        debug!("Creating user {}", id);

        match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "INSERT INTO users (id, phone, wechat_openid, nickname, roles)
                     VALUES ($1, $2, $3, $4, $5)
                     RETURNING {}",
                    USER_COLUMNS
                );
                Ok(sqlx::query_as::<_, User>(&sql)
                    .bind(id)
                    .bind(&user.phone)
                    .bind(&user.wechat_openid)
                    .bind(&user.nickname)
                    .bind(&roles)
                    .fetch_one(pool)
                    .await?)
            }
            None => {
                let now = Utc::now();
                let row = User {
                    id,
                    phone: user.phone.clone(),
                    wechat_openid: user.wechat_openid.clone(),
                    nickname: user.nickname,
                    roles,
                    created_at: now,
                    updated_at: now,
                };
                self.storage.insert_unless(id, row, |existing| {
                    (user.phone.is_some() && existing.phone == user.phone)
                        || (user.wechat_openid.is_some() && existing.wechat_openid == user.wechat_openid)
                })
            }
        }
    }

    async fn update_nickname(&self, id: Uuid, nickname: &str) -> Result<User, RepositoryError> {
        let updated = match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "UPDATE users SET nickname = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
                    USER_COLUMNS
                );
                sqlx::query_as::<_, User>(&sql)
                    .bind(id)
                    .bind(nickname)
                    .fetch_optional(pool)
                    .await?
            }
            None => self.storage.update(&id, |u| {
                u.nickname = Some(nickname.to_string());
                u.updated_at = Utc::now();
            })?,
        };
        updated.ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = UserRepository::in_memory();

        let user = repo
            .create(NewUser {
                phone: Some("13800138000".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(user.roles, vec!["user".to_string()]);

        let found = repo.find_by_phone("13800138000").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(repo.find_by_openid("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_phone_conflicts() {
        let repo = UserRepository::in_memory();
        let new_user = NewUser { phone: Some("13800138000".to_string()), ..Default::default() };

        repo.create(new_user.clone()).await.unwrap();
        let result = repo.create(new_user).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_nickname() {
        let repo = UserRepository::in_memory();
        let user = repo
            .create(NewUser { wechat_openid: Some("o-123".to_string()), ..Default::default() })
            .await
            .unwrap();

        let updated = repo.update_nickname(user.id, "小王").await.unwrap();
        assert_eq!(updated.nickname.as_deref(), Some("小王"));

        let missing = repo.update_nickname(Uuid::new_v4(), "x").await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }
}
