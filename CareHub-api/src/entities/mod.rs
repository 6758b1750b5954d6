// Public entities for the CareHub API
// Request and response bodies shared across the application boundary

// Error and pagination envelopes
pub mod common;

// Login, refresh and profile
pub mod auth;

pub mod doctor;

pub mod appointment;

pub mod consultation;

// Plans, orders and cards
pub mod membership;
