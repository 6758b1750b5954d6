// Domain services
// Business rules on top of the data repositories, one module per area.

pub mod appointments;
pub mod consultations;
pub mod doctors;
pub mod membership;

pub use appointments::{
    AppointmentService, AppointmentServiceError, AppointmentServiceTrait,
    BookAppointment,
};
pub use consultations::{
    ConsultationService, ConsultationServiceError, ConsultationServiceTrait,
    SubmitConsultation, CONSULTATION_CATEGORIES,
};
pub use doctors::{
    CreateDoctor, DoctorQuery, DoctorService, DoctorServiceError, DoctorServiceTrait,
    UpdateDoctor,
};
pub use membership::{
    best_discount_from_cards, CardView, MembershipService,
    MembershipServiceError, MembershipServiceTrait,
};

use care_hub_data::models::PageRequest;
use validator::ValidationErrors;

/// Page size used when the client does not ask for one
pub const DEFAULT_PAGE_LIMIT: usize = 20;
/// Largest page a client may request
pub const MAX_PAGE_LIMIT: usize = 100;

/// One page of a listing plus the total number of matching rows
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    pub fn new((items, total): (Vec<T>, usize), page: PageRequest) -> Self {
        Self { items, total, limit: page.limit, offset: page.offset }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Clamp client paging parameters: missing or zero limit means the default,
/// anything above the maximum is capped.
pub fn page_request(limit: Option<usize>, offset: Option<usize>) -> PageRequest {
    let limit = match limit {
        None | Some(0) => DEFAULT_PAGE_LIMIT,
        Some(limit) => limit.min(MAX_PAGE_LIMIT),
    };
    PageRequest::new(limit, offset.unwrap_or(0))
}

/// Flatten `validator` errors into one readable message
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let error_msgs: Vec<String> = errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect();
            format!("{}: {}", field, error_msgs.join(", "))
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
