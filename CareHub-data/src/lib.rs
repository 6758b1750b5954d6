// CareHub Data
// This crate handles database access and the storage models behind the API

// Database connection management
pub mod database;

// Repository implementations for data access
pub mod repository;

// Data storage models
pub mod models;
