// Repository module structure
pub mod errors;
mod in_memory;

mod appointment;
mod consultation;
mod doctor;
mod membership;
mod user;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use in_memory::InMemoryStore;

pub use appointment::{AppointmentRepository, AppointmentRepositoryTrait};
pub use consultation::{ConsultationRepository, ConsultationRepositoryTrait};
pub use doctor::{DoctorRepository, DoctorRepositoryTrait};
pub use membership::{seeded_plans, MembershipRepository, MembershipRepositoryTrait};
pub use user::{UserRepository, UserRepositoryTrait};

use tracing::debug;

use crate::database::{get_db_pool, DatabasePool};

/// Pick up the global pool if it has been initialized.
///
/// Repositories built without a pool keep their rows in memory, which is how
/// tests and database-less local runs work.
pub(crate) fn detect_pool(repository: &str) -> Option<DatabasePool> {
    match get_db_pool() {
        Ok(pool) => Some(pool),
        Err(e) => {
            debug!("{} repository using in-memory storage ({})", repository, e);
            None
        }
    }
}

/// Escape `%`, `_` and `\` so user input is matched literally by ILIKE
pub(crate) fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cardio"), "%cardio%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }
}
