//! Versioned schema migrations.
//!
//! Scripts live in `CareHub-data/migrations/` as `NNNN_description.sql` and
//! are embedded at compile time. Applied versions are tracked by sqlx in the
//! `_sqlx_migrations` table, so re-running on an up-to-date database is a no-op.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use super::DatabaseError;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> i64 {
    MIGRATOR.iter().map(|migration| migration.version).max().unwrap_or(0)
}

/// Number of embedded migration scripts
pub fn migration_count() -> usize {
    MIGRATOR.iter().count()
}

/// Run PostgreSQL database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    info!("Running PostgreSQL migrations (latest version {})", latest_version());

    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    info!("PostgreSQL migrations completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded_in_order() {
        assert_eq!(migration_count(), 3);
        assert_eq!(latest_version(), 3);

        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted);
    }
}
