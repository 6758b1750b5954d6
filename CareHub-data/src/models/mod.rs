// Storage models, one module per table group
pub mod appointment;
pub mod consultation;
pub mod doctor;
pub mod membership;
pub mod user;

pub use appointment::{Appointment, AppointmentStatus, NewAppointment};
pub use consultation::{Consultation, ConsultationStatus, NewConsultation};
pub use doctor::{Doctor, DoctorChanges, DoctorFilter, NewDoctor};
pub use membership::{MembershipCard, MembershipPlan, NewMembershipCard, NewOrder, Order, OrderStatus};
pub use user::{NewUser, User};

use thiserror::Error;

/// Limit/offset window for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl PageRequest {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Apply the window to an already sorted vector, returning the page and the total
    pub fn slice<T>(&self, items: Vec<T>) -> (Vec<T>, usize) {
        let total = items.len();
        let page = items.into_iter().skip(self.offset).take(self.limit).collect();
        (page, total)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

/// A status column held a value this build does not know
#[derive(Debug, Clone, Error)]
#[error("Unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slice() {
        let items: Vec<u32> = (1..=7).collect();

        let (page, total) = PageRequest::new(3, 0).slice(items.clone());
        assert_eq!(page, vec![1, 2, 3]);
        assert_eq!(total, 7);

        let (page, total) = PageRequest::new(3, 6).slice(items.clone());
        assert_eq!(page, vec![7]);
        assert_eq!(total, 7);

        let (page, _) = PageRequest::new(3, 10).slice(items);
        assert!(page.is_empty());
    }
}
