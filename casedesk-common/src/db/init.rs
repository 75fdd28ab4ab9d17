//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas, creates
//! every table idempotently and then runs versioned migrations.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go on the connect options so every pooled connection gets them,
    // not just the first one
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema_version_table(&pool).await?;
    create_users_table(&pool).await?;
    create_records_table(&pool).await?;
    create_record_comments_table(&pool).await?;
    create_assignment_history_table(&pool).await?;
    create_id_sequences_table(&pool).await?;

    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the records table
///
/// Repeatable entry lists (`claim_no`, `adj_number`, `doi`) and the
/// descriptive `details` block are JSON columns; fields the engines filter
/// on are real columns. User references carry no foreign key because actors
/// may come from the upstream identity provider without a local row.
async fn create_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            reference_id TEXT NOT NULL UNIQUE,
            provider TEXT NOT NULL,
            pt_name TEXT NOT NULL,
            claim_no TEXT NOT NULL DEFAULT '[]',
            adj_number TEXT NOT NULL DEFAULT '[]',
            doi TEXT NOT NULL DEFAULT '[]',
            bill REAL,
            paid REAL,
            outstanding REAL,
            ledger TEXT NOT NULL DEFAULT 'not required',
            hcf TEXT NOT NULL DEFAULT 'not required',
            invoice TEXT NOT NULL DEFAULT 'not required',
            signin_sheet TEXT NOT NULL DEFAULT 'not required',
            lien_status TEXT,
            case_status TEXT,
            hearing_date TEXT,
            hearing_time TEXT,
            details TEXT NOT NULL DEFAULT '{}',
            assigned_collector TEXT,
            assigned_at TEXT,
            assigned_by TEXT,
            assigned_payment_redeemer TEXT,
            payment_assigned_at TEXT,
            payment_assigned_by TEXT,
            record_created_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for ddl in [
        "CREATE INDEX IF NOT EXISTS idx_records_provider ON records(provider)",
        "CREATE INDEX IF NOT EXISTS idx_records_pt_name ON records(pt_name)",
        "CREATE INDEX IF NOT EXISTS idx_records_collector ON records(assigned_collector)",
        "CREATE INDEX IF NOT EXISTS idx_records_redeemer ON records(assigned_payment_redeemer)",
        "CREATE INDEX IF NOT EXISTS idx_records_hearing_date ON records(hearing_date)",
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}

/// Create the record_comments table
///
/// Comments are an ordered child collection: ascending `position` is list
/// order, so prepending means `MIN(position) - 1`.
async fn create_record_comments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS record_comments (
            id TEXT PRIMARY KEY,
            record_id TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            status TEXT NOT NULL,
            author TEXT NOT NULL,
            scheduled_date TEXT,
            scheduled_time TEXT,
            offer_amount REAL,
            check_number TEXT,
            check_date TEXT,
            check_amount REAL,
            check_copy TEXT,
            is_completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            is_from_merged_record INTEGER NOT NULL DEFAULT 0,
            source_record_id TEXT,
            source_comment_id TEXT,
            source_record_snapshot TEXT,
            merged_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_record_comments_order ON record_comments(record_id, position)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_record_comments_author ON record_comments(author)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_assignment_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignment_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
            from_collector TEXT,
            to_collector TEXT,
            assigned_by TEXT,
            assigned_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_assignment_history_record ON assignment_history(record_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Named atomic counters (reference ids)
async fn create_id_sequences_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS id_sequences (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
