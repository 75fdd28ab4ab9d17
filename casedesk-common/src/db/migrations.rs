//! Database schema migrations
//!
//! Versioned, idempotent upgrades tracked in the `schema_version` table.
//! Tables themselves are created with `CREATE TABLE IF NOT EXISTS` in
//! [`crate::db::init`]; migrations only carry data fixes and column changes
//! for databases created by older builds.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - they must stay stable for upgrades
//! 2. **Always add new migrations** - one function per schema or data change
//! 3. **Stay idempotent** - every migration must be safe to run twice

use crate::reference::max_reference_number;
use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Name of the reference id counter in `id_sequences`
pub const REFERENCE_SEQUENCE: &str = "record_reference";

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: seed the reference id counter
///
/// **Background:** Databases imported from older deployments already hold
/// `REF-` ids. The counter starts at the numeric maximum of the well-formed
/// ones so new ids never collide. Malformed ids are skipped.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Seed reference id sequence");

    let seeded: Option<i64> =
        sqlx::query_scalar("SELECT value FROM id_sequences WHERE name = ?")
            .bind(REFERENCE_SEQUENCE)
            .fetch_optional(pool)
            .await?;

    if seeded.is_some() {
        info!("  Reference sequence already seeded - skipping");
        return Ok(());
    }

    let existing: Vec<String> = sqlx::query_scalar("SELECT reference_id FROM records")
        .fetch_all(pool)
        .await?;
    let start = max_reference_number(existing.iter().map(String::as_str)).unwrap_or(0);

    sqlx::query("INSERT INTO id_sequences (name, value) VALUES (?, ?)")
        .bind(REFERENCE_SEQUENCE)
        .bind(start)
        .execute(pool)
        .await?;

    info!("  ✓ Reference sequence starts after {}", start);
    Ok(())
}

/// Migration v2: backfill missing outstanding balances
///
/// **Background:** Imported rows could carry bill and paid without the
/// derived outstanding amount. Only rows with both inputs are touched.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Backfill outstanding balances");

    let result = sqlx::query(
        r#"
        UPDATE records
        SET outstanding = bill - paid
        WHERE outstanding IS NULL AND bill IS NOT NULL AND paid IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    info!("  ✓ Backfilled {} record(s)", result.rows_affected());
    Ok(())
}
