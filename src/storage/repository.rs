use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqliteExecutor, SqlitePool, Transaction};
use uuid::Uuid;

use super::{MIGRATION_001_INITIAL, MIGRATION_002_LEDGERS, MIGRATION_003_BOOKINGS_AND_FLEET};

/// Date columns are stored as `YYYY-MM-DD`, which sorts chronologically.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Insertion counters used as the same-day tiebreak in ledger order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCounter {
    Trip,
    CashEntry,
}

impl SequenceCounter {
    fn name(&self) -> &'static str {
        match self {
            SequenceCounter::Trip => "trip_sequence",
            SequenceCounter::CashEntry => "cash_entry_sequence",
        }
    }
}

/// Repository for persisting and querying fleet records.
///
/// Methods that take an `executor` can run either directly on the pool or
/// inside a transaction opened with [`Repository::begin`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    ///
    /// SQLite allows a single writer, so the pool holds one connection and
    /// callers queue for it. Code running inside a transaction must use the
    /// transaction as executor, never the pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL '{}'", database_url))?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Every statement is idempotent.
    pub async fn migrate(&self) -> Result<()> {
        for (name, sql) in [
            ("001", MIGRATION_001_INITIAL),
            ("002", MIGRATION_002_LEDGERS),
            ("003", MIGRATION_003_BOOKINGS_AND_FLEET),
        ] {
            sqlx::raw_sql(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to run migration {}", name))?;
        }
        tracing::debug!("database migrations applied");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    /// Cheap round-trip used by the health check.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    /// Get the next value of an insertion counter and advance it.
    pub async fn next_sequence<'e, E>(&self, executor: E, counter: SequenceCounter) -> Result<i64>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = ?
            RETURNING value
            "#,
        )
        .bind(counter.name())
        .fetch_one(executor)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }
}

/// Whether `err` is SQLite refusing a write that breaks a UNIQUE constraint.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("Invalid date '{}'", s))
}

pub(crate) fn parse_optional_date(s: Option<String>) -> Result<Option<NaiveDate>> {
    s.map(|s| parse_date(&s)).transpose()
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp '{}'", s))?
        .with_timezone(&Utc))
}

pub(crate) fn parse_uuid(s: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("Invalid {} '{}'", what, s))
}

pub(crate) fn parse_optional_uuid(s: Option<String>, what: &str) -> Result<Option<Uuid>> {
    s.map(|s| parse_uuid(&s, what)).transpose()
}
