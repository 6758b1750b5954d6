use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::errors::RepositoryError;
use super::in_memory::InMemoryStore;
use super::like_pattern;
use crate::database::DatabasePool;
use crate::models::{Doctor, DoctorChanges, DoctorFilter, NewDoctor, PageRequest};

const DOCTOR_COLUMNS: &str = "id, name, title, department, hospital, specialties, bio, avatar_url, \
     consultation_fee_cents, rating, is_active, created_at, updated_at";

/// Shared WHERE clause; $1 department, $2 keyword pattern, $3 active_only
const DOCTOR_FILTER: &str = "($1::TEXT IS NULL OR department = $1)
       AND ($2::TEXT IS NULL OR name ILIKE $2 OR hospital ILIKE $2 OR specialties ILIKE $2)
       AND (NOT $3 OR is_active)";

/// Repository trait for doctor listings
#[async_trait]
pub trait DoctorRepositoryTrait {
    /// Filtered, paginated listing ordered by rating then name
    async fn list(&self, filter: &DoctorFilter, page: PageRequest) -> Result<(Vec<Doctor>, usize), RepositoryError>;

    /// Get a doctor by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Doctor>, RepositoryError>;

    /// Create a doctor listing
    async fn create(&self, doctor: NewDoctor) -> Result<Doctor, RepositoryError>;

    /// Partially update a doctor listing
    async fn update(&self, id: Uuid, changes: DoctorChanges) -> Result<Doctor, RepositoryError>;

    /// Distinct departments of active doctors, sorted
    async fn list_departments(&self) -> Result<Vec<String>, RepositoryError>;
}

/// Repository for doctor listings
#[derive(Debug, Clone, Default)]
pub struct DoctorRepository {
    pool: Option<DatabasePool>,
    storage: InMemoryStore<Doctor>,
}

impl DoctorRepository {
    /// Create a repository backed by the global pool when available
    pub fn new() -> Self {
        Self {
            pool: super::detect_pool("doctor"),
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

fn listing_order(a: &Doctor, b: &Doctor) -> Ordering {
    b.rating
        .partial_cmp(&a.rating)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.name.cmp(&b.name))
}

#[async_trait]
impl DoctorRepositoryTrait for DoctorRepository {
    async fn list(&self, filter: &DoctorFilter, page: PageRequest) -> Result<(Vec<Doctor>, usize), RepositoryError> {
        match &self.pool {
            Some(pool) => {
                debug!("Listing doctors from database: {:?}", filter);
                let keyword = filter.keyword.as_deref().map(like_pattern);

                let count_sql = format!("SELECT COUNT(*) FROM doctors WHERE {}", DOCTOR_FILTER);
                let total: i64 = sqlx::query_scalar(&count_sql)
                    .bind(&filter.department)
                    .bind(&keyword)
                    .bind(filter.active_only)
                    .fetch_one(pool)
                    .await?;

                let sql = format!(
                    "SELECT {} FROM doctors WHERE {} ORDER BY rating DESC, name ASC LIMIT $4 OFFSET $5",
                    DOCTOR_COLUMNS, DOCTOR_FILTER
                );
                let doctors = sqlx::query_as::<_, Doctor>(&sql)
                    .bind(&filter.department)
                    .bind(&keyword)
                    .bind(filter.active_only)
                    .bind(page.limit as i64)
                    .bind(page.offset as i64)
                    .fetch_all(pool)
                    .await?;

                Ok((doctors, total.max(0) as usize))
            }
            None => {
                let mut doctors = self.storage.filter(|d| filter.matches(d))?;
                doctors.sort_by(listing_order);
                Ok(page.slice(doctors))
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Doctor>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM doctors WHERE id = $1", DOCTOR_COLUMNS);
                Ok(sqlx::query_as::<_, Doctor>(&sql).bind(id).fetch_optional(pool).await?)
            }
            None => self.storage.get(&id),
        }
    }

    async fn create(&self, doctor: NewDoctor) -> Result<Doctor, RepositoryError> {
        let id = Uuid::new_v4();
        debug!("Creating doctor {} ({})", id, doctor.name);

        match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "INSERT INTO doctors
                     (id, name, title, department, hospital, specialties, bio, avatar_url, consultation_fee_cents, rating)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                     RETURNING {}",
                    DOCTOR_COLUMNS
                );
                Ok(sqlx::query_as::<_, Doctor>(&sql)
                    .bind(id)
                    .bind(&doctor.name)
                    .bind(&doctor.title)
                    .bind(&doctor.department)
                    .bind(&doctor.hospital)
                    .bind(&doctor.specialties)
                    .bind(&doctor.bio)
                    .bind(&doctor.avatar_url)
                    .bind(doctor.consultation_fee_cents)
                    .bind(doctor.rating)
                    .fetch_one(pool)
                    .await?)
            }
            None => {
                let now = Utc::now();
                let row = Doctor {
                    id,
                    name: doctor.name,
                    title: doctor.title,
                    department: doctor.department,
                    hospital: doctor.hospital,
                    specialties: doctor.specialties,
                    bio: doctor.bio,
                    avatar_url: doctor.avatar_url,
                    consultation_fee_cents: doctor.consultation_fee_cents,
                    rating: doctor.rating,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                self.storage.insert(id, row)
            }
        }
    }

    async fn update(&self, id: Uuid, changes: DoctorChanges) -> Result<Doctor, RepositoryError> {
        let updated = match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "UPDATE doctors SET
                        name = COALESCE($2, name),
                        title = COALESCE($3, title),
                        department = COALESCE($4, department),
                        hospital = COALESCE($5, hospital),
                        specialties = COALESCE($6, specialties),
                        bio = COALESCE($7, bio),
                        avatar_url = COALESCE($8, avatar_url),
                        consultation_fee_cents = COALESCE($9, consultation_fee_cents),
                        rating = COALESCE($10, rating),
                        is_active = COALESCE($11, is_active),
                        updated_at = NOW()
                     WHERE id = $1
                     RETURNING {}",
                    DOCTOR_COLUMNS
                );
                sqlx::query_as::<_, Doctor>(&sql)
                    .bind(id)
                    .bind(&changes.name)
                    .bind(&changes.title)
                    .bind(&changes.department)
                    .bind(&changes.hospital)
                    .bind(&changes.specialties)
                    .bind(&changes.bio)
                    .bind(&changes.avatar_url)
                    .bind(changes.consultation_fee_cents)
                    .bind(changes.rating)
                    .bind(changes.is_active)
                    .fetch_optional(pool)
                    .await?
            }
            None => self.storage.update(&id, |doctor| {
                changes.apply_to(doctor);
                doctor.updated_at = Utc::now();
            })?,
        };
        updated.ok_or_else(|| RepositoryError::NotFound(format!("doctor {}", id)))
    }

    async fn list_departments(&self) -> Result<Vec<String>, RepositoryError> {
        match &self.pool {
            Some(pool) => Ok(sqlx::query_scalar::<_, String>(
                "SELECT DISTINCT department FROM doctors WHERE is_active ORDER BY department",
            )
            .fetch_all(pool)
            .await?),
            None => {
                let mut departments: Vec<String> = self
                    .storage
                    .filter(|d| d.is_active)?
                    .into_iter()
                    .map(|d| d.department)
                    .collect();
                departments.sort();
                departments.dedup();
                Ok(departments)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_doctor(name: &str, department: &str, rating: f64) -> NewDoctor {
        NewDoctor {
            name: name.to_string(),
            title: "主任医师".to_string(),
            department: department.to_string(),
            hospital: "Ruijin Hospital".to_string(),
            specialties: "hypertension, diabetes".to_string(),
            bio: String::new(),
            avatar_url: None,
            consultation_fee_cents: 5000,
            rating,
        }
    }

    #[tokio::test]
    async fn test_list_orders_by_rating_and_filters() {
        let repo = DoctorRepository::in_memory();
        repo.create(new_doctor("Dr. Li", "cardiology", 4.5)).await.unwrap();
        repo.create(new_doctor("Dr. Wang", "cardiology", 4.9)).await.unwrap();
        let zhao = repo.create(new_doctor("Dr. Zhao", "pediatrics", 4.7)).await.unwrap();

        let (all, total) = repo.list(&DoctorFilter::default(), PageRequest::new(10, 0)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[0].name, "Dr. Wang");
        assert_eq!(all[2].name, "Dr. Li");

        let filter = DoctorFilter { department: Some("cardiology".to_string()), ..Default::default() };
        let (cardio, total) = repo.list(&filter, PageRequest::new(1, 0)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(cardio.len(), 1);

        repo.update(zhao.id, DoctorChanges { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();
        let active = DoctorFilter { active_only: true, ..Default::default() };
        let (_, total) = repo.list(&active, PageRequest::new(10, 0)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(repo.list_departments().await.unwrap(), vec!["cardiology".to_string()]);
    }

    #[tokio::test]
    async fn test_keyword_is_case_insensitive() {
        let repo = DoctorRepository::in_memory();
        repo.create(new_doctor("Dr. Li", "cardiology", 4.5)).await.unwrap();

        let filter = DoctorFilter { keyword: Some("DIABETES".to_string()), ..Default::default() };
        let (found, _) = repo.list(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(found.len(), 1);

        let filter = DoctorFilter { keyword: Some("oncology".to_string()), ..Default::default() };
        let (found, _) = repo.list(&filter, PageRequest::default()).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_doctor() {
        let repo = DoctorRepository::in_memory();
        let result = repo.update(Uuid::new_v4(), DoctorChanges::default()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }
}
