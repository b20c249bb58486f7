//! SQLite database migration management.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

/// Errors raised while migrating the schema.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration statement failed.
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        /// Version of the failing migration.
        version: i64,
        /// Underlying error.
        #[source]
        source: sqlx::Error,
    },
    /// `schema_migrations` could not be read.
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
    /// Migrations must be listed in ascending version order.
    #[error("Migration {version} is listed after version {previous}")]
    OutOfOrder {
        /// Misplaced version.
        version: i64,
        /// Version listed before it.
        previous: i64,
    },
}

/// A versioned schema change.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Strictly increasing schema version.
    pub version: i64,
    /// Recorded alongside the version.
    pub description: String,
    /// Statements applied in one batch.
    pub sql: String,
}

/// Applies embedded migrations and tracks them in `schema_migrations`.
pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    /// Migrator over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply every migration newer than the current schema version.
    ///
    /// Returns how many migrations were applied.
    pub async fn run_embedded_migrations(
        &self,
        migrations: Vec<Migration>,
    ) -> Result<usize, MigrationError> {
        check_sequence(&migrations)?;
        self.ensure_migrations_table().await?;
        let current_version = self.get_current_version().await?;
        let pending: Vec<_> = migrations
            .into_iter()
            .filter(|m| m.version > current_version)
            .collect();

        for migration in &pending {
            self.apply_migration(migration).await?;
            info!(version = migration.version, description = %migration.description, "applied migration");
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError {
            version: 0,
            source: e,
        })?;
        Ok(())
    }

    /// Highest applied version, or 0 for a fresh database.
    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let result: Option<(i64,)> =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_optional(&self.pool)
                .await
                .map_err(MigrationError::VersionCheckError)?;
        Ok(result.map_or(0, |(v,)| v))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        let failed = |source: sqlx::Error| MigrationError::ExecutionError {
            version: migration.version,
            source,
        };

        let mut tx = self.pool.begin().await.map_err(failed)?;
        sqlx::raw_sql(&migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)?;
        Ok(())
    }

    /// Applied versions with their descriptions, oldest first.
    pub async fn applied_migrations(&self) -> Result<Vec<(i64, String)>, MigrationError> {
        sqlx::query_as(
            "SELECT version, COALESCE(description, '') FROM schema_migrations ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(MigrationError::VersionCheckError)
    }
}

fn check_sequence(migrations: &[Migration]) -> Result<(), MigrationError> {
    for pair in migrations.windows(2) {
        if pair[1].version <= pair[0].version {
            return Err(MigrationError::OutOfOrder {
                version: pair[1].version,
                previous: pair[0].version,
            });
        }
    }
    Ok(())
}

/// Tables for learner results and their steps.
pub fn learner_results_migration() -> Migration {
    Migration {
        version: 1,
        description: "Learner results and steps".to_string(),
        sql: include_str!("../../../migrations/001_learner_results.sql").to_string(),
    }
}

/// Every migration shipped with the binary, in order.
pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![learner_results_migration()]
}
