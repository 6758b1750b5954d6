pub mod admin;
pub mod appointments;
pub mod auth;
pub mod consultations;
pub mod doctors;
pub mod health;
pub mod membership;

pub use health::health_check;
