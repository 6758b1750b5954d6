// CareHub Domain
// This crate contains the business logic for the CareHub API

// Typed configuration loaded from the environment
pub mod config;

// Authentication: tokens, SMS codes, WeChat login, RBAC
pub mod auth;

// Services that implement business logic
pub mod services;

// Health checks and system status
pub mod health;

// Codes, hashing and formatting helpers
pub mod util;

// Re-export the database module from care_hub_data for convenience
pub use care_hub_data::database;

// Test doubles - unit tests, or other crates with the mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;
