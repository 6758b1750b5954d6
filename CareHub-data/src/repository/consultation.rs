use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::errors::RepositoryError;
use super::in_memory::InMemoryStore;
use crate::database::DatabasePool;
use crate::models::{Consultation, ConsultationStatus, NewConsultation, PageRequest};

const CONSULTATION_COLUMNS: &str =
    "id, user_id, name, phone, category, message, status, reply, created_at, updated_at";

/// Repository trait for consultations
#[async_trait]
pub trait ConsultationRepositoryTrait {
    /// Store a new open consultation
    async fn create(&self, consultation: NewConsultation) -> Result<Consultation, RepositoryError>;

    /// Get a consultation by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Consultation>, RepositoryError>;

    /// A user's consultations, newest first
    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> Result<(Vec<Consultation>, usize), RepositoryError>;

    /// All consultations, optionally by status, newest first
    async fn list_all(
        &self,
        status: Option<ConsultationStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Consultation>, usize), RepositoryError>;

    /// Store a staff reply and mark the consultation replied
    async fn reply(&self, id: Uuid, reply: &str) -> Result<Consultation, RepositoryError>;

    /// Overwrite the status
    async fn update_status(&self, id: Uuid, status: ConsultationStatus) -> Result<Consultation, RepositoryError>;
}

/// Repository for consultations
#[derive(Debug, Clone, Default)]
pub struct ConsultationRepository {
    pool: Option<DatabasePool>,
    storage: InMemoryStore<Consultation>,
}

impl ConsultationRepository {
    /// Create a repository backed by the global pool when available
    pub fn new() -> Self {
        Self {
            pool: super::detect_pool("consultation"),
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

    fn newest_first(mut rows: Vec<Consultation>, page: PageRequest) -> (Vec<Consultation>, usize) {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        page.slice(rows)
    }

    async fn list_where(
        &self,
        pool: &DatabasePool,
        user_id: Option<Uuid>,
        status: Option<ConsultationStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Consultation>, usize), RepositoryError> {
        let filter = "($1::UUID IS NULL OR user_id = $1) AND ($2::TEXT IS NULL OR status = $2)";
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM consultations WHERE {}", filter))
            .bind(user_id)
            .bind(status)
            .fetch_one(pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM consultations WHERE {} ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            CONSULTATION_COLUMNS, filter
        );
        let rows = sqlx::query_as::<_, Consultation>(&sql)
            .bind(user_id)
            .bind(status)
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(pool)
            .await?;

        Ok((rows, total.max(0) as usize))
    }
}

#[async_trait]
impl ConsultationRepositoryTrait for ConsultationRepository {
    async fn create(&self, consultation: NewConsultation) -> Result<Consultation, RepositoryError> {
        let id = Uuid::new_v4();
        debug!("Storing consultation {} ({})", id, consultation.category);

        match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "INSERT INTO consultations (id, user_id, name, phone, category, message, status)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     RETURNING {}",
                    CONSULTATION_COLUMNS
                );
                Ok(sqlx::query_as::<_, Consultation>(&sql)
                    .bind(id)
                    .bind(consultation.user_id)
                    .bind(&consultation.name)
                    .bind(&consultation.phone)
                    .bind(&consultation.category)
                    .bind(&consultation.message)
                    .bind(ConsultationStatus::Open.as_str())
                    .fetch_one(pool)
                    .await?)
            }
            None => {
                let now = Utc::now();
                let row = Consultation {
                    id,
                    user_id: consultation.user_id,
                    name: consultation.name,
                    phone: consultation.phone,
                    category: consultation.category,
                    message: consultation.message,
                    status: ConsultationStatus::Open,
                    reply: None,
                    created_at: now,
                    updated_at: now,
                };
                self.storage.insert(id, row)
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Consultation>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM consultations WHERE id = $1", CONSULTATION_COLUMNS);
                Ok(sqlx::query_as::<_, Consultation>(&sql).bind(id).fetch_optional(pool).await?)
            }
            None => self.storage.get(&id),
        }
    }

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> Result<(Vec<Consultation>, usize), RepositoryError> {
        match &self.pool {
            Some(pool) => self.list_where(pool, Some(user_id), None, page).await,
            None => {
                let rows = self.storage.filter(|c| c.user_id == Some(user_id))?;
                Ok(Self::newest_first(rows, page))
            }
        }
    }

    async fn list_all(
        &self,
        status: Option<ConsultationStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Consultation>, usize), RepositoryError> {
        match &self.pool {
            Some(pool) => self.list_where(pool, None, status, page).await,
            None => {
                let rows = self.storage.filter(|c| status.map_or(true, |s| c.status == s))?;
                Ok(Self::newest_first(rows, page))
            }
        }
    }

    async fn reply(&self, id: Uuid, reply: &str) -> Result<Consultation, RepositoryError> {
        let updated = match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "UPDATE consultations SET reply = $2, status = $3, updated_at = NOW()
                     WHERE id = $1 RETURNING {}",
                    CONSULTATION_COLUMNS
                );
                sqlx::query_as::<_, Consultation>(&sql)
                    .bind(id)
                    .bind(reply)
                    .bind(ConsultationStatus::Replied.as_str())
                    .fetch_optional(pool)
                    .await?
            }
            None => self.storage.update(&id, |c| {
                c.reply = Some(reply.to_string());
                c.status = ConsultationStatus::Replied;
                c.updated_at = Utc::now();
            })?,
        };
        updated.ok_or_else(|| RepositoryError::NotFound(format!("consultation {}", id)))
    }

    async fn update_status(&self, id: Uuid, status: ConsultationStatus) -> Result<Consultation, RepositoryError> {
        let updated = match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "UPDATE consultations SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
                    CONSULTATION_COLUMNS
                );
                sqlx::query_as::<_, Consultation>(&sql)
                    .bind(id)
                    .bind(status.as_str())
                    .fetch_optional(pool)
                    .await?
            }
            None => self.storage.update(&id, |c| {
                c.status = status;
                c.updated_at = Utc::now();
            })?,
        };
        updated.ok_or_else(|| RepositoryError::NotFound(format!("consultation {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inquiry(user_id: Option<Uuid>) -> NewConsultation {
        NewConsultation {
            user_id,
            name: "李四".to_string(),
            phone: "13900139000".to_string(),
            category: "medical".to_string(),
            message: "How should I prepare for a blood test?".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reply_marks_replied() {
        let repo = ConsultationRepository::in_memory();
        let created = repo.create(inquiry(None)).await.unwrap();
        assert_eq!(created.status, ConsultationStatus::Open);

        let replied = repo.reply(created.id, "Fast for 8 hours beforehand.").await.unwrap();
        assert_eq!(replied.status, ConsultationStatus::Replied);
        assert_eq!(replied.reply.as_deref(), Some("Fast for 8 hours beforehand."));

        let (open, _) = repo.list_all(Some(ConsultationStatus::Open), PageRequest::default()).await.unwrap();
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn test_list_for_user_excludes_anonymous() {
        let repo = ConsultationRepository::in_memory();
        let user = Uuid::new_v4();
        repo.create(inquiry(Some(user))).await.unwrap();
        repo.create(inquiry(None)).await.unwrap();

        let (mine, total) = repo.list_for_user(user, PageRequest::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(mine[0].user_id, Some(user));
    }
}
