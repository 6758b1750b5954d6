pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

#[cfg(test)]
mod routes_tests;

use axum::Router;

use care_hub_domain::config::AppConfig;

use crate::api::state::{AppState, StateError};

/// Create the application router from configuration
pub fn create_application(config: &AppConfig) -> Result<Router, StateError> {
    let state = AppState::from_config(config)?;
    Ok(routes::create_app(state))
}
