use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use care_hub_data::models::{Appointment, AppointmentStatus, NewAppointment};
use care_hub_data::repository::{
    AppointmentRepositoryTrait, DoctorRepositoryTrait, MembershipRepositoryTrait, RepositoryError,
};

use crate::services::membership::best_discount_from_cards;
use crate::services::{page_request, validation_message, Page};
use crate::util::{apply_discount, is_valid_phone, normalize_phone};

/// How far ahead an appointment may be booked
pub const MAX_BOOKING_DAYS: i64 = 90;

/// Appointment service errors
#[derive(Debug, Error)]
pub enum AppointmentServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown or inactive doctor
    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    /// Unknown appointment, or one of another user
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    /// The doctor already has a live appointment at that time
    #[error("The requested time slot is already booked")]
    SlotTaken,

    #[error("Cannot change appointment from {from} to {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<RepositoryError> for AppointmentServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => AppointmentServiceError::SlotTaken,
            RepositoryError::Validation(msg) => AppointmentServiceError::Validation(msg),
            other => {
                error!("Appointment repository error: {}", other);
                AppointmentServiceError::Repository(other.to_string())
            }
        }
    }
}

/// Booking request
#[derive(Debug, Clone, Validate)]
pub struct BookAppointment {
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    #[validate(length(min = 1, max = 50, message = "patient_name must be 1-50 characters"))]
    pub patient_name: String,
    pub patient_phone: String,
    #[validate(length(max = 500, message = "notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Allowed admin status changes
pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    use AppointmentStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
    )
}

/// Trait for appointment operations
#[async_trait]
pub trait AppointmentServiceTrait: Send + Sync {
    /// Book a slot with a doctor for `user_id`
    async fn book(&self, user_id: Uuid, request: BookAppointment) -> Result<Appointment, AppointmentServiceError>;

    /// The user's appointments, latest slot first
    async fn list_mine(
        &self,
        user_id: Uuid,
        status: Option<AppointmentStatus>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Appointment>, AppointmentServiceError>;

    /// One of the user's appointments
    async fn get_mine(&self, user_id: Uuid, id: Uuid) -> Result<Appointment, AppointmentServiceError>;

    /// Owner cancellation while pending or confirmed
    async fn cancel(&self, user_id: Uuid, id: Uuid) -> Result<Appointment, AppointmentServiceError>;

    /// Admin listing across users
    async fn list_all(
        &self,
        status: Option<AppointmentStatus>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Appointment>, AppointmentServiceError>;

    /// Admin status change
    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, AppointmentServiceError>;
}

/// Appointment booking service
pub struct AppointmentService<A, D, M>
where
    A: AppointmentRepositoryTrait,
    D: DoctorRepositoryTrait,
    M: MembershipRepositoryTrait,
{
    appointments: A,
    doctors: D,
    memberships: M,
}

impl<A, D, M> AppointmentService<A, D, M>
where
    A: AppointmentRepositoryTrait + Send + Sync,
    D: DoctorRepositoryTrait + Send + Sync,
    M: MembershipRepositoryTrait + Send + Sync,
{
    pub fn new(appointments: A, doctors: D, memberships: M) -> Self {
        Self { appointments, doctors, memberships }
    }

    fn validate_request(request: &BookAppointment, now: DateTime<Utc>) -> Result<String, AppointmentServiceError> {
        request
            .validate()
            .map_err(|e| AppointmentServiceError::Validation(validation_message(&e)))?;

        let phone = normalize_phone(&request.patient_phone);
        if !is_valid_phone(&phone) {
            return Err(AppointmentServiceError::Validation(
                "patient_phone must be a mainland mobile number".to_string(),
            ));
        }

        if request.scheduled_at <= now {
            return Err(AppointmentServiceError::Validation(
                "scheduled_at must be in the future".to_string(),
            ));
        }
        if request.scheduled_at > now + Duration::days(MAX_BOOKING_DAYS) {
            return Err(AppointmentServiceError::Validation(format!(
                "scheduled_at must be within {} days",
                MAX_BOOKING_DAYS
            )));
        }

        Ok(phone)
    }

    async fn owned(&self, user_id: Uuid, id: Uuid) -> Result<Appointment, AppointmentServiceError> {
        match self.appointments.get_by_id(id).await? {
            Some(appointment) if appointment.user_id == user_id => Ok(appointment),
            _ => Err(AppointmentServiceError::NotFound(id)),
        }
    }

    async fn set_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, AppointmentServiceError> {
        match self.appointments.update_status(id, status).await {
            Ok(appointment) => Ok(appointment),
            Err(RepositoryError::NotFound(_)) => Err(AppointmentServiceError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<A, D, M> AppointmentServiceTrait for AppointmentService<A, D, M>
where
    A: AppointmentRepositoryTrait + Send + Sync,
    D: DoctorRepositoryTrait + Send + Sync,
    M: MembershipRepositoryTrait + Send + Sync,
{
    async fn book(&self, user_id: Uuid, request: BookAppointment) -> Result<Appointment, AppointmentServiceError> {
        let now = Utc::now();
        let phone = Self::validate_request(&request, now)?;

        let doctor = match self.doctors.get_by_id(request.doctor_id).await? {
            Some(doctor) if doctor.is_active => doctor,
            _ => return Err(AppointmentServiceError::DoctorNotFound(request.doctor_id)),
        };

        if self.appointments.exists_active_slot(doctor.id, request.scheduled_at).await? {
            warn!("Slot {} for doctor {} already booked", request.scheduled_at, doctor.id);
            return Err(AppointmentServiceError::SlotTaken);
        }

        let cards = self.memberships.list_cards_for_user(user_id).await?;
        let discount_percent = best_discount_from_cards(&cards, now);
        let price_cents = apply_discount(doctor.consultation_fee_cents, discount_percent);

        // The repository re-checks the slot atomically
        let appointment = self
            .appointments
            .create(NewAppointment {
                user_id,
                doctor_id: doctor.id,
                scheduled_at: request.scheduled_at,
                patient_name: request.patient_name.trim().to_string(),
                patient_phone: phone,
                notes: request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                price_cents,
                discount_percent,
            })
            .await?;

        info!(
            "User {} booked appointment {} with doctor {} ({}% off)",
            user_id, appointment.id, doctor.id, discount_percent
        );
        Ok(appointment)
    }

    async fn list_mine(
        &self,
        user_id: Uuid,
        status: Option<AppointmentStatus>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Appointment>, AppointmentServiceError> {
        let page = page_request(limit, offset);
        let result = self.appointments.list_for_user(user_id, status, page).await?;
        Ok(Page::new(result, page))
    }

    async fn get_mine(&self, user_id: Uuid, id: Uuid) -> Result<Appointment, AppointmentServiceError> {
        self.owned(user_id, id).await
    }

    async fn cancel(&self, user_id: Uuid, id: Uuid) -> Result<Appointment, AppointmentServiceError> {
        let appointment = self.owned(user_id, id).await?;

        match appointment.status {
            AppointmentStatus::Pending | AppointmentStatus::Confirmed => {
                let cancelled = self.set_status(id, AppointmentStatus::Cancelled).await?;
                info!("User {} cancelled appointment {}", user_id, id);
                Ok(cancelled)
            }
            from => Err(AppointmentServiceError::InvalidTransition { from, to: AppointmentStatus::Cancelled }),
        }
    }

    async fn list_all(
        &self,
        status: Option<AppointmentStatus>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Page<Appointment>, AppointmentServiceError> {
        let page = page_request(limit, offset);
        let result = self.appointments.list_all(status, page).await?;
        Ok(Page::new(result, page))
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, AppointmentServiceError> {
        let current = self
            .appointments
            .get_by_id(id)
            .await?
            .ok_or(AppointmentServiceError::NotFound(id))?;

        if !can_transition(current.status, status) {
            return Err(AppointmentServiceError::InvalidTransition { from: current.status, to: status });
        }

        let updated = self.set_status(id, status).await?;
        info!("Appointment {} moved from {} to {}", id, current.status, status);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use care_hub_data::repository::{AppointmentRepository, DoctorRepository, MembershipRepository};
    use care_hub_data::models::{Doctor, NewDoctor};
    use crate::services::membership::{MembershipService, MembershipServiceTrait};

    struct Fixture {
        service: AppointmentService<AppointmentRepository, DoctorRepository, MembershipRepository>,
        memberships: MembershipRepository,
        doctor: Doctor,
    }

    async fn fixture() -> Fixture {
        let doctors = DoctorRepository::in_memory();
        let memberships = MembershipRepository::in_memory();
        let doctor = doctors
            .create(NewDoctor {
                name: "王医生".to_string(),
                title: "主任医师".to_string(),
                department: "cardiology".to_string(),
                hospital: "协和医院".to_string(),
                specialties: String::new(),
                bio: String::new(),
                avatar_url: None,
                consultation_fee_cents: 9999,
                rating: 4.8,
            })
            .await
            .unwrap();

        Fixture {
            service: AppointmentService::new(AppointmentRepository::in_memory(), doctors, memberships.clone()),
            memberships,
            doctor,
        }
    }

    fn request(doctor_id: Uuid, scheduled_at: DateTime<Utc>) -> BookAppointment {
        BookAppointment {
            doctor_id,
            scheduled_at,
            patient_name: "张三".to_string(),
            patient_phone: "+86 138 0013 8000".to_string(),
            notes: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_transitions() {
        use AppointmentStatus::*;
        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(Confirmed, Completed));
        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Completed, Cancelled));
        assert!(!can_transition(Cancelled, Pending));
    }

    #[tokio::test]
    async fn test_book_and_conflict() {
        let Fixture { service, doctor, .. } = fixture().await;
        let user = Uuid::new_v4();
        let slot = Utc::now() + Duration::days(3);

        let booked = service.book(user, request(doctor.id, slot)).await.unwrap();
        assert_eq!(booked.status, AppointmentStatus::Pending);
        assert_eq!(booked.price_cents, 9999);
        assert_eq!(booked.discount_percent, 0);
        assert_eq!(booked.patient_phone, "13800138000");
        assert_eq!(booked.notes, None);

        let other_user = Uuid::new_v4();
        assert!(matches!(
            service.book(other_user, request(doctor.id, slot)).await,
            Err(AppointmentServiceError::SlotTaken)
        ));

        // Cancelling frees the slot
        service.cancel(user, booked.id).await.unwrap();
        assert!(service.book(other_user, request(doctor.id, slot)).await.is_ok());
    }

    #[tokio::test]
    async fn test_time_window() {
        let Fixture { service, doctor, .. } = fixture().await;
        let user = Uuid::new_v4();

        let past = service.book(user, request(doctor.id, Utc::now() - Duration::hours(1))).await;
        assert!(matches!(past, Err(AppointmentServiceError::Validation(_))));

        let too_far = service.book(user, request(doctor.id, Utc::now() + Duration::days(91))).await;
        assert!(matches!(too_far, Err(AppointmentServiceError::Validation(_))));

        let unknown = service.book(user, request(Uuid::new_v4(), Utc::now() + Duration::days(1))).await;
        assert!(matches!(unknown, Err(AppointmentServiceError::DoctorNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_patient_phone() {
        let Fixture { service, doctor, .. } = fixture().await;
        let mut bad = request(doctor.id, Utc::now() + Duration::days(1));
        bad.patient_phone = "555-1234".to_string();
        assert!(matches!(
            service.book(Uuid::new_v4(), bad).await,
            Err(AppointmentServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_member_discount_applied() {
        let Fixture { service, memberships, doctor } = fixture().await;
        let user = Uuid::new_v4();

        let membership = MembershipService::new(memberships);
        let order = membership.create_order(user, "quarterly").await.unwrap();
        membership.confirm_payment(user, order.id).await.unwrap();

        let booked = service.book(user, request(doctor.id, Utc::now() + Duration::days(1))).await.unwrap();
        assert_eq!(booked.discount_percent, 15);
        // 9999 * 0.85 = 8499.15
        assert_eq!(booked.price_cents, 8499);
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let Fixture { service, doctor, .. } = fixture().await;
        let user = Uuid::new_v4();
        let booked = service.book(user, request(doctor.id, Utc::now() + Duration::days(1))).await.unwrap();

        assert!(matches!(
            service.cancel(Uuid::new_v4(), booked.id).await,
            Err(AppointmentServiceError::NotFound(_))
        ));

        service.update_status(booked.id, AppointmentStatus::Confirmed).await.unwrap();
        service.update_status(booked.id, AppointmentStatus::Completed).await.unwrap();

        assert!(matches!(
            service.cancel(user, booked.id).await,
            Err(AppointmentServiceError::InvalidTransition { from: AppointmentStatus::Completed, .. })
        ));
    }

    #[tokio::test]
    async fn test_admin_listing_and_transitions() {
        let Fixture { service, doctor, .. } = fixture().await;
        let user = Uuid::new_v4();
        let first = service.book(user, request(doctor.id, Utc::now() + Duration::days(1))).await.unwrap();
        service.book(user, request(doctor.id, Utc::now() + Duration::days(2))).await.unwrap();

        assert!(matches!(
            service.update_status(first.id, AppointmentStatus::Completed).await,
            Err(AppointmentServiceError::InvalidTransition { .. })
        ));
        service.update_status(first.id, AppointmentStatus::Cancelled).await.unwrap();

        let pending = service.list_all(Some(AppointmentStatus::Pending), None, None).await.unwrap();
        assert_eq!(pending.total, 1);
        let mine = service.list_mine(user, None, Some(1), None).await.unwrap();
        assert_eq!(mine.total, 2);
        assert_eq!(mine.items.len(), 1);

        assert!(matches!(
            service.update_status(Uuid::new_v4(), AppointmentStatus::Confirmed).await,
            Err(AppointmentServiceError::NotFound(_))
        ));
    }
}
