//! Domain layer health check functionality
//! Component status for the database and the API process itself

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use care_hub_data::database::{self, DatabaseError};
use tracing::warn;

/// System health status
#[derive(Debug, Clone, PartialEq)]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Represents a health component with status and optional details
#[derive(Debug, Clone)]
pub struct HealthComponent {
    pub status: ComponentStatus,
    pub details: Option<String>,
}

impl HealthComponent {
    pub fn healthy() -> Self {
        Self { status: ComponentStatus::Healthy, details: None }
    }

    pub fn with_status(status: ComponentStatus, details: impl Into<String>) -> Self {
        Self { status, details: Some(details.into()) }
    }
}

/// Represents the overall health of the system
#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub status: SystemStatus,
    /// Map of component names to their health status
    pub components: HashMap<String, HealthComponent>,
    pub uptime_seconds: u64,
    pub environment: String,
}

impl SystemHealth {
    /// Worst component status wins
    pub fn from_components(components: HashMap<String, HealthComponent>, uptime_seconds: u64, environment: &str) -> Self {
        let status = if components.values().any(|c| c.status == ComponentStatus::Unhealthy) {
            SystemStatus::Unhealthy
        } else if components.values().any(|c| c.status == ComponentStatus::Degraded) {
            SystemStatus::Degraded
        } else {
            SystemStatus::Healthy
        };

        Self { status, components, uptime_seconds, environment: environment.to_string() }
    }
}

/// Trait for health services
#[async_trait]
pub trait HealthServiceTrait: Send + Sync + std::fmt::Debug {
    /// Get the overall system health
    async fn get_system_health(&self) -> SystemHealth;

    /// Status of the database component
    async fn check_database_status(&self) -> HealthComponent;
}

/// Probe the global pool.
///
/// Without a pool the API serves from in-memory storage, which is reported
/// as degraded rather than failed.
pub async fn check_database_status() -> HealthComponent {
    match database::check_database_health().await {
        Ok(true) => HealthComponent::healthy(),
        Ok(false) => HealthComponent::with_status(ComponentStatus::Degraded, "Database is experiencing high latency"),
        Err(DatabaseError::PoolNotInitialized) => {
            HealthComponent::with_status(ComponentStatus::Degraded, "in-memory storage")
        }
        Err(e) => {
            warn!("Database health check failed: {}", e);
            HealthComponent::with_status(ComponentStatus::Unhealthy, "Database connection failed")
        }
    }
}

/// Health service tracking process uptime
#[derive(Debug)]
pub struct HealthService {
    started_at: Instant,
    environment: String,
}

impl HealthService {
    pub fn new(environment: impl Into<String>) -> Self {
        Self { started_at: Instant::now(), environment: environment.into() }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let mut components = HashMap::new();
        components.insert("database".to_string(), self.check_database_status().await);
        components.insert("api".to_string(), HealthComponent::healthy());

        SystemHealth::from_components(components, self.started_at.elapsed().as_secs(), &self.environment)
    }

    async fn check_database_status(&self) -> HealthComponent {
        check_database_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_storage_is_degraded() {
        let health = HealthService::new("test").get_system_health().await;

        let database = &health.components["database"];
        assert_eq!(database.status, ComponentStatus::Degraded);
        assert_eq!(database.details.as_deref(), Some("in-memory storage"));
        assert_eq!(health.components["api"].status, ComponentStatus::Healthy);
        assert_eq!(health.status, SystemStatus::Degraded);
        assert_eq!(health.environment, "test");
    }

    #[test]
    fn test_worst_component_wins() {
        let mut components = HashMap::new();
        components.insert("api".to_string(), HealthComponent::healthy());
        assert_eq!(SystemHealth::from_components(components.clone(), 0, "dev").status, SystemStatus::Healthy);

        components.insert(
            "database".to_string(),
            HealthComponent::with_status(ComponentStatus::Unhealthy, "down"),
        );
        assert_eq!(SystemHealth::from_components(components, 0, "dev").status, SystemStatus::Unhealthy);
    }
}
