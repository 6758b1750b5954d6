use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::{Consultation, ConsultationStatus, NewConsultation};
use care_hub_data::repository::{ConsultationRepositoryTrait, RepositoryError};

use crate::services::{page_request, validation_message, Page};
use crate::util::{is_valid_phone, mask_phone, normalize_phone};

/// Accepted consultation categories
pub const CONSULTATION_CATEGORIES: [&str; 5] = ["general", "medical", "membership", "appointment", "other"];

/// Consultation service errors
#[derive(Debug, Error)]
pub enum ConsultationServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Consultation not found: {0}")]
    NotFound(Uuid),

    /// Closed consultations cannot be replied to
    #[error("Consultation {0} is closed")]
    Closed(Uuid),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<RepositoryError> for ConsultationServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Validation(msg) => ConsultationServiceError::Validation(msg),
            other => {
                error!("Consultation repository error: {}", other);
                ConsultationServiceError::Repository(other.to_string())
            }
        }
    }
}

/// A submitted inquiry
#[derive(Debug, Clone, Validate)]
pub struct SubmitConsultation {
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: String,
    pub phone: String,
    pub category: String,
    #[validate(length(min = 1, max = 2000, message = "message must be 1-2000 characters"))]
    pub message: String,
}

/// Trait for consultation operations
#[async_trait]
pub trait ConsultationServiceTrait: Send + Sync {
    /// Record an inquiry; `user_id` is set when the sender is signed in
    async fn submit(
        &self,
        user_id: Option<Uuid>,
        request: SubmitConsultation,
    ) -> Result<Consultation, ConsultationServiceError>;

    /// Inquiries submitted by the user, newest first
    async fn list_mine(
        &self,
        user_id: Uuid,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Consultation>, ConsultationServiceError>;

    /// Admin listing, optionally by status
    async fn list(
        &self,
        status: Option<ConsultationStatus>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Consultation>, ConsultationServiceError>;

    /// Admin reply; marks the consultation replied
    async fn reply(&self, id: Uuid, reply: &str) -> Result<Consultation, ConsultationServiceError>;

    /// Admin close
    async fn close(&self, id: Uuid) -> Result<Consultation, ConsultationServiceError>;
}

/// Consultation service
pub struct ConsultationService<R: ConsultationRepositoryTrait> {
    repository: R,
}

impl<R: ConsultationRepositoryTrait + Send + Sync> ConsultationService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    async fn existing(&self, id: Uuid) -> Result<Consultation, ConsultationServiceError> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(ConsultationServiceError::NotFound(id))
    }
}

#[async_trait]
impl<R: ConsultationRepositoryTrait + Send + Sync> ConsultationServiceTrait for ConsultationService<R> {
    async fn submit(
        &self,
        user_id: Option<Uuid>,
        request: SubmitConsultation,
    ) -> Result<Consultation, ConsultationServiceError> {
        let request = SubmitConsultation {
            name: request.name.trim().to_string(),
            phone: normalize_phone(&request.phone),
            category: request.category.trim().to_lowercase(),
            message: request.message.trim().to_string(),
        };

        request
            .validate()
            .map_err(|e| ConsultationServiceError::Validation(validation_message(&e)))?;

        if !is_valid_phone(&request.phone) {
            return Err(ConsultationServiceError::Validation(
                "phone must be a mainland mobile number".to_string(),
            ));
        }
        if !CONSULTATION_CATEGORIES.contains(&request.category.as_str()) {
            return Err(ConsultationServiceError::Validation(format!(
                "category must be one of: {}",
                CONSULTATION_CATEGORIES.join(", ")
            )));
        }

        let consultation = self
            .repository
            .create(NewConsultation {
                user_id,
                name: request.name,
                phone: request.phone,
                category: request.category,
                message: request.message,
            })
            .await?;

        info!(
            "Consultation {} ({}) submitted from {}",
            consultation.id,
            consultation.category,
            mask_phone(&consultation.phone)
        );
        Ok(consultation)
    }

    async fn list_mine(
        &self,
        user_id: Uuid,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Consultation>, ConsultationServiceError> {
        let page = page_request(limit, offset);
        let result = self.repository.list_for_user(user_id, page).await?;
        Ok(Page::new(result, page))
    }

    async fn list(
        &self,
        status: Option<ConsultationStatus>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Consultation>, ConsultationServiceError> {
        let page = page_request(limit, offset);
        let result = self.repository.list_all(status, page).await?;
        Ok(Page::new(result, page))
    }

    async fn reply(&self, id: Uuid, reply: &str) -> Result<Consultation, ConsultationServiceError> {
        let reply = reply.trim();
        if reply.is_empty() || reply.chars().count() > 2000 {
            return Err(ConsultationServiceError::Validation(
                "reply must be 1-2000 characters".to_string(),
            ));
        }

        let current = self.existing(id).await?;
        if current.status == ConsultationStatus::Closed {
            return Err(ConsultationServiceError::Closed(id));
        }

        let replied = self.repository.reply(id, reply).await?;
        info!("Consultation {} replied", id);
        Ok(replied)
    }

    async fn close(&self, id: Uuid) -> Result<Consultation, ConsultationServiceError> {
        self.existing(id).await?;
        let closed = self.repository.update_status(id, ConsultationStatus::Closed).await?;
        info!("Consultation {} closed", id);
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use care_hub_data::repository::ConsultationRepository;

    fn service() -> ConsultationService<ConsultationRepository> {
        ConsultationService::new(ConsultationRepository::in_memory())
    }

    fn request(category: &str, message: &str) -> SubmitConsultation {
        SubmitConsultation {
            name: " 李四 ".to_string(),
            phone: "13912345678".to_string(),
            category: category.to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_normalizes_and_attaches_user() {
        let service = service();
        let user = Uuid::new_v4();

        let created = service.submit(Some(user), request("Medical", "头疼三天")).await.unwrap();
        assert_eq!(created.name, "李四");
        assert_eq!(created.category, "medical");
        assert_eq!(created.status, ConsultationStatus::Open);
        assert_eq!(created.user_id, Some(user));

        service.submit(None, request("general", "anonymous question")).await.unwrap();

        let mine = service.list_mine(user, None, None).await.unwrap();
        assert_eq!(mine.total, 1);
        let all = service.list(None, None, None).await.unwrap();
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let service = service();

        assert!(matches!(
            service.submit(None, request("billing", "hi")).await,
            Err(ConsultationServiceError::Validation(msg)) if msg.contains("category")
        ));
        assert!(matches!(
            service.submit(None, request("general", "   ")).await,
            Err(ConsultationServiceError::Validation(_))
        ));
        assert!(matches!(
            service.submit(None, request("general", &"字".repeat(2001))).await,
            Err(ConsultationServiceError::Validation(_))
        ));

        let mut bad_phone = request("general", "hello");
        bad_phone.phone = "12345".to_string();
        assert!(matches!(
            service.submit(None, bad_phone).await,
            Err(ConsultationServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_reply_and_close() {
        let service = service();
        let created = service.submit(None, request("membership", "how do cards stack?")).await.unwrap();

        assert!(matches!(service.reply(created.id, "  ").await, Err(ConsultationServiceError::Validation(_))));

        let replied = service.reply(created.id, "They extend each other.").await.unwrap();
        assert_eq!(replied.status, ConsultationStatus::Replied);
        assert_eq!(replied.reply.as_deref(), Some("They extend each other."));

        let closed = service.close(created.id).await.unwrap();
        assert_eq!(closed.status, ConsultationStatus::Closed);
        assert!(matches!(
            service.reply(created.id, "late").await,
            Err(ConsultationServiceError::Closed(_))
        ));

        let replied_only = service.list(Some(ConsultationStatus::Replied), None, None).await.unwrap();
        assert_eq!(replied_only.total, 0);

        assert!(matches!(
            service.close(Uuid::new_v4()).await,
            Err(ConsultationServiceError::NotFound(_))
        ));
    }
}
