use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::{Doctor, DoctorChanges, DoctorFilter, NewDoctor};
use care_hub_data::repository::{DoctorRepositoryTrait, RepositoryError};

use crate::services::{page_request, validation_message, Page};

/// Doctor service errors
#[derive(Debug, Error)]
pub enum DoctorServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Doctor not found: {0}")]
    NotFound(Uuid),

    #[error("Repository error: {0}")]
    Repository(String),
}

/// Public listing query
#[derive(Debug, Clone, Default)]
pub struct DoctorQuery {
    pub department: Option<String>,
    pub keyword: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Fields for a new doctor listing
#[derive(Debug, Clone, Validate)]
pub struct CreateDoctor {
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: String,
    #[validate(length(max = 50))]
    pub title: String,
    #[validate(length(min = 1, max = 50, message = "department must be 1-50 characters"))]
    pub department: String,
    #[validate(length(max = 100))]
    pub hospital: String,
    #[validate(length(max = 500))]
    pub specialties: String,
    #[validate(length(max = 2000))]
    pub bio: String,
    pub avatar_url: Option<String>,
    #[validate(range(min = 0, max = 100000000, message = "fee must be between 0 and 100000000 cents"))]
    pub consultation_fee_cents: i64,
    #[validate(range(min = 0.0, max = 5.0, message = "rating must be between 0 and 5"))]
    pub rating: f64,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateDoctor {
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 50))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 50, message = "department must be 1-50 characters"))]
    pub department: Option<String>,
    #[validate(length(max = 100))]
    pub hospital: Option<String>,
    #[validate(length(max = 500))]
    pub specialties: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[validate(range(min = 0, max = 100000000, message = "fee must be between 0 and 100000000 cents"))]
    pub consultation_fee_cents: Option<i64>,
    #[validate(range(min = 0.0, max = 5.0, message = "rating must be between 0 and 5"))]
    pub rating: Option<f64>,
    pub is_active: Option<bool>,
}

/// Trait for doctor listing operations
#[async_trait]
pub trait DoctorServiceTrait: Send + Sync {
    /// Active doctors matching the query
    async fn list(&self, query: DoctorQuery) -> Result<Page<Doctor>, DoctorServiceError>;

    /// A publicly visible doctor; inactive listings are `NotFound`
    async fn get(&self, id: Uuid) -> Result<Doctor, DoctorServiceError>;

    /// Admin create
    async fn create(&self, doctor: CreateDoctor) -> Result<Doctor, DoctorServiceError>;

    /// Admin update, including (de)activation
    async fn update(&self, id: Uuid, changes: UpdateDoctor) -> Result<Doctor, DoctorServiceError>;

    /// Departments that have at least one active doctor
    async fn list_departments(&self) -> Result<Vec<String>, DoctorServiceError>;
}

/// Doctor listing service
pub struct DoctorService<R: DoctorRepositoryTrait> {
    repository: R,
}

impl<R: DoctorRepositoryTrait> DoctorService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    fn map_repo_error(err: RepositoryError) -> DoctorServiceError {
        match err {
            RepositoryError::Validation(msg) => DoctorServiceError::Validation(msg),
            other => {
                error!("Doctor repository error: {}", other);
                DoctorServiceError::Repository(other.to_string())
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[async_trait]
impl<R: DoctorRepositoryTrait + Send + Sync> DoctorServiceTrait for DoctorService<R> {
    async fn list(&self, query: DoctorQuery) -> Result<Page<Doctor>, DoctorServiceError> {
        let page = page_request(query.limit, query.offset);
        let filter = DoctorFilter {
            department: non_empty(query.department),
            keyword: non_empty(query.keyword),
            active_only: true,
        };

        let result = self.repository.list(&filter, page).await.map_err(Self::map_repo_error)?;
        Ok(Page::new(result, page))
    }

    async fn get(&self, id: Uuid) -> Result<Doctor, DoctorServiceError> {
        match self.repository.get_by_id(id).await.map_err(Self::map_repo_error)? {
            Some(doctor) if doctor.is_active => Ok(doctor),
            _ => Err(DoctorServiceError::NotFound(id)),
        }
    }

    async fn create(&self, doctor: CreateDoctor) -> Result<Doctor, DoctorServiceError> {
        doctor
            .validate()
            .map_err(|e| DoctorServiceError::Validation(validation_message(&e)))?;

        let created = self
            .repository
            .create(NewDoctor {
                name: doctor.name.trim().to_string(),
                title: doctor.title,
                department: doctor.department.trim().to_string(),
                hospital: doctor.hospital,
                specialties: doctor.specialties,
                bio: doctor.bio,
                avatar_url: non_empty(doctor.avatar_url),
                consultation_fee_cents: doctor.consultation_fee_cents,
                rating: doctor.rating,
            })
            .await
            .map_err(Self::map_repo_error)?;

        info!("Created doctor {} ({})", created.id, created.name);
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UpdateDoctor) -> Result<Doctor, DoctorServiceError> {
        changes
            .validate()
            .map_err(|e| DoctorServiceError::Validation(validation_message(&e)))?;

        let changes = DoctorChanges {
            name: changes.name.map(|n| n.trim().to_string()),
            title: changes.title,
            department: changes.department.map(|d| d.trim().to_string()),
            hospital: changes.hospital,
            specialties: changes.specialties,
            bio: changes.bio,
            avatar_url: changes.avatar_url,
            consultation_fee_cents: changes.consultation_fee_cents,
            rating: changes.rating,
            is_active: changes.is_active,
        };

        match self.repository.update(id, changes).await {
            Ok(doctor) => {
                info!("Updated doctor {}", id);
                Ok(doctor)
            }
            Err(RepositoryError::NotFound(_)) => Err(DoctorServiceError::NotFound(id)),
            Err(e) => Err(Self::map_repo_error(e)),
        }
    }

    async fn list_departments(&self) -> Result<Vec<String>, DoctorServiceError> {
        self.repository.list_departments().await.map_err(Self::map_repo_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use care_hub_data::repository::DoctorRepository;

    fn sample(name: &str, department: &str) -> CreateDoctor {
        CreateDoctor {
            name: name.to_string(),
            title: "主任医师".to_string(),
            department: department.to_string(),
            hospital: "协和医院".to_string(),
            specialties: "hypertension".to_string(),
            bio: String::new(),
            avatar_url: None,
            consultation_fee_cents: 5000,
            rating: 4.5,
        }
    }

    fn service() -> DoctorService<DoctorRepository> {
        DoctorService::new(DoctorRepository::in_memory())
    }

    #[tokio::test]
    async fn test_create_validates() {
        let service = service();

        let mut bad = sample("", "cardiology");
        bad.rating = 6.0;
        match service.create(bad).await {
            Err(DoctorServiceError::Validation(msg)) => {
                assert!(msg.contains("name"));
                assert!(msg.contains("rating"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let mut negative_fee = sample("Dr. Wang", "cardiology");
        negative_fee.consultation_fee_cents = -1;
        assert!(matches!(service.create(negative_fee).await, Err(DoctorServiceError::Validation(_))));

        let mut huge_fee = sample("Dr. Wang", "cardiology");
        huge_fee.consultation_fee_cents = i64::MAX / 50;
        assert!(matches!(service.create(huge_fee).await, Err(DoctorServiceError::Validation(_))));

        let doctor = service.create(sample("Dr. Zhao", "cardiology")).await.unwrap();
        let raise = UpdateDoctor { consultation_fee_cents: Some(100_000_001), ..Default::default() };
        assert!(matches!(service.update(doctor.id, raise).await, Err(DoctorServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_inactive_doctor_hidden() {
        let service = service();
        let doctor = service.create(sample("Dr. Li", "cardiology")).await.unwrap();
        assert_eq!(service.get(doctor.id).await.unwrap().name, "Dr. Li");

        service
            .update(doctor.id, UpdateDoctor { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();

        assert!(matches!(service.get(doctor.id).await, Err(DoctorServiceError::NotFound(_))));
        let page = service.list(DoctorQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(service.list_departments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_paging_and_filters() {
        let service = service();
        for i in 0..3 {
            service.create(sample(&format!("Dr. C{}", i), "cardiology")).await.unwrap();
        }
        service.create(sample("Dr. P", "pediatrics")).await.unwrap();

        let page = service
            .list(DoctorQuery { limit: Some(2), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.limit, 2);

        let page = service
            .list(DoctorQuery { department: Some("pediatrics".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 20);

        assert_eq!(service.list_departments().await.unwrap(), vec!["cardiology", "pediatrics"]);
    }

    #[tokio::test]
    async fn test_update_missing() {
        let result = service().update(Uuid::new_v4(), UpdateDoctor::default()).await;
        assert!(matches!(result, Err(DoctorServiceError::NotFound(_))));
    }
}
