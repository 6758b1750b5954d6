use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::errors::RepositoryError;
use super::in_memory::InMemoryStore;
use crate::database::DatabasePool;
use crate::models::{Appointment, AppointmentStatus, NewAppointment, PageRequest};

const APPOINTMENT_COLUMNS: &str = "id, user_id, doctor_id, scheduled_at, status, patient_name, patient_phone, \
     notes, price_cents, discount_percent, created_at, updated_at";

/// Repository trait for appointments
#[async_trait]
pub trait AppointmentRepositoryTrait {
    /// Insert a new pending appointment; `Conflict` if the slot is taken
    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, RepositoryError>;

    /// Get an appointment by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError>;

    /// A user's appointments, most recent slot first
    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<AppointmentStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Appointment>, usize), RepositoryError>;

    /// All appointments, most recent slot first
    async fn list_all(
        &self,
        status: Option<AppointmentStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Appointment>, usize), RepositoryError>;

    /// Whether a non-cancelled appointment already holds the slot
    async fn exists_active_slot(&self, doctor_id: Uuid, scheduled_at: DateTime<Utc>) -> Result<bool, RepositoryError>;

    /// Overwrite the status
    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, RepositoryError>;
}

/// Repository for appointments
#[derive(Debug, Clone, Default)]
pub struct AppointmentRepository {
    pool: Option<DatabasePool>,
    storage: InMemoryStore<Appointment>,
}

impl AppointmentRepository {
    /// Create a repository backed by the global pool when available
    pub fn new() -> Self {
        Self {
            pool: super::detect_pool("appointment"),
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

    fn sorted_page(mut rows: Vec<Appointment>, page: PageRequest) -> (Vec<Appointment>, usize) {
        rows.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        page.slice(rows)
    }

    async fn list_where(
        &self,
        pool: &DatabasePool,
        user_id: Option<Uuid>,
        status: Option<AppointmentStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Appointment>, usize), RepositoryError> {
        let filter = "($1::UUID IS NULL OR user_id = $1) AND ($2::TEXT IS NULL OR status = $2)";
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM appointments WHERE {}", filter))
            .bind(user_id)
            .bind(status)
            .fetch_one(pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM appointments WHERE {} ORDER BY scheduled_at DESC LIMIT $3 OFFSET $4",
            APPOINTMENT_COLUMNS, filter
        );
        let rows = sqlx::query_as::<_, Appointment>(&sql)
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
impl AppointmentRepositoryTrait for AppointmentRepository {
    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, RepositoryError> {
        let id = Uuid::new_v4();
        debug!(
            "Booking appointment {} with doctor {} at {}",
            id, appointment.doctor_id, appointment.scheduled_at
        );

        match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "INSERT INTO appointments
                     (id, user_id, doctor_id, scheduled_at, status, patient_name, patient_phone, notes, price_cents, discount_percent)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                     RETURNING {}",
                    APPOINTMENT_COLUMNS
                );
                Ok(sqlx::query_as::<_, Appointment>(&sql)
                    .bind(id)
                    .bind(appointment.user_id)
                    .bind(appointment.doctor_id)
                    .bind(appointment.scheduled_at)
                    .bind(AppointmentStatus::Pending.as_str())
                    .bind(&appointment.patient_name)
                    .bind(&appointment.patient_phone)
                    .bind(&appointment.notes)
                    .bind(appointment.price_cents)
                    .bind(appointment.discount_percent)
                    .fetch_one(pool)
                    .await?)
            }
            None => {
                let now = Utc::now();
                let doctor_id = appointment.doctor_id;
                let scheduled_at = appointment.scheduled_at;
                let row = Appointment {
                    id,
                    user_id: appointment.user_id,
                    doctor_id,
                    scheduled_at,
                    status: AppointmentStatus::Pending,
                    patient_name: appointment.patient_name,
                    patient_phone: appointment.patient_phone,
                    notes: appointment.notes,
                    price_cents: appointment.price_cents,
                    discount_percent: appointment.discount_percent,
                    created_at: now,
                    updated_at: now,
                };
                self.storage.insert_unless(id, row, |existing| {
                    existing.doctor_id == doctor_id
                        && existing.scheduled_at == scheduled_at
                        && existing.status.is_active()
                })
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError> {
        match &self.pool {
            Some(pool) => {
                let sql = format!("SELECT {} FROM appointments WHERE id = $1", APPOINTMENT_COLUMNS);
                Ok(sqlx::query_as::<_, Appointment>(&sql).bind(id).fetch_optional(pool).await?)
            }
            None => self.storage.get(&id),
        }
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<AppointmentStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Appointment>, usize), RepositoryError> {
        match &self.pool {
            Some(pool) => self.list_where(pool, Some(user_id), status, page).await,
            None => {
                let rows = self
                    .storage
                    .filter(|a| a.user_id == user_id && status.map_or(true, |s| a.status == s))?;
                Ok(Self::sorted_page(rows, page))
            }
        }
    }

    async fn list_all(
        &self,
        status: Option<AppointmentStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Appointment>, usize), RepositoryError> {
        match &self.pool {
            Some(pool) => self.list_where(pool, None, status, page).await,
            None => {
                let rows = self.storage.filter(|a| status.map_or(true, |s| a.status == s))?;
                Ok(Self::sorted_page(rows, page))
            }
        }
    }

    async fn exists_active_slot(&self, doctor_id: Uuid, scheduled_at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        match &self.pool {
            Some(pool) => Ok(sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(
                    SELECT 1 FROM appointments
                    WHERE doctor_id = $1 AND scheduled_at = $2 AND status <> 'cancelled'
                 )",
            )
            .bind(doctor_id)
            .bind(scheduled_at)
            .fetch_one(pool)
            .await?),
            None => Ok(self
                .storage
                .find(|a| a.doctor_id == doctor_id && a.scheduled_at == scheduled_at && a.status.is_active())?
                .is_some()),
        }
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, RepositoryError> {
        let updated = match &self.pool {
            Some(pool) => {
                let sql = format!(
                    "UPDATE appointments SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
                    APPOINTMENT_COLUMNS
                );
                sqlx::query_as::<_, Appointment>(&sql)
                    .bind(id)
                    .bind(status.as_str())
                    .fetch_optional(pool)
                    .await?
            }
            None => self.storage.update(&id, |a| {
                a.status = status;
                a.updated_at = Utc::now();
            })?,
        };
        updated.ok_or_else(|| RepositoryError::NotFound(format!("appointment {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn booking(user_id: Uuid, doctor_id: Uuid, scheduled_at: DateTime<Utc>) -> NewAppointment {
        NewAppointment {
            user_id,
            doctor_id,
            scheduled_at,
            patient_name: "张三".to_string(),
            patient_phone: "13800138000".to_string(),
            notes: None,
            price_cents: 5000,
            discount_percent: 0,
        }
    }

    #[tokio::test]
    async fn test_slot_conflict_until_cancelled() {
        let repo = AppointmentRepository::in_memory();
        let doctor = Uuid::new_v4();
        let slot = Utc::now() + Duration::days(2);

        let first = repo.create(booking(Uuid::new_v4(), doctor, slot)).await.unwrap();
        assert!(repo.exists_active_slot(doctor, slot).await.unwrap());

        let second = repo.create(booking(Uuid::new_v4(), doctor, slot)).await;
        assert!(matches!(second, Err(RepositoryError::Conflict(_))));

        repo.update_status(first.id, AppointmentStatus::Cancelled).await.unwrap();
        assert!(!repo.exists_active_slot(doctor, slot).await.unwrap());
        assert!(repo.create(booking(Uuid::new_v4(), doctor, slot)).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_for_user_filters_and_sorts() {
        let repo = AppointmentRepository::in_memory();
        let user = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let now = Utc::now();

        let early = repo.create(booking(user, doctor, now + Duration::days(1))).await.unwrap();
        let late = repo.create(booking(user, doctor, now + Duration::days(3))).await.unwrap();
        repo.create(booking(Uuid::new_v4(), doctor, now + Duration::days(2))).await.unwrap();

        let (mine, total) = repo.list_for_user(user, None, PageRequest::new(10, 0)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(mine[0].id, late.id);
        assert_eq!(mine[1].id, early.id);

        repo.update_status(early.id, AppointmentStatus::Confirmed).await.unwrap();
        let (confirmed, _) = repo
            .list_for_user(user, Some(AppointmentStatus::Confirmed), PageRequest::new(10, 0))
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, early.id);

        let (_, total) = repo.list_all(None, PageRequest::new(10, 0)).await.unwrap();
        assert_eq!(total, 3);
    }
}
