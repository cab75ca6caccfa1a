//! Counter repository

use crate::error::Result;
use sqlx::SqlitePool;

/// Repository for the single persistent counter value.
///
/// `load` distinguishes "no value stored yet" (`Ok(None)`) from a genuine
/// database failure (`Err`); callers must only default the former to zero.
#[derive(Clone)]
pub struct CounterRepository {
    pool: SqlitePool,
}

impl CounterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the stored counter value, if any
    pub async fn load(&self) -> Result<Option<u64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT value FROM counter WHERE id = 0")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value as u64))
    }

    /// Store the counter value, replacing any previous one
    pub async fn save(&self, value: u64) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO counter (id, value) VALUES (0, ?)
               ON CONFLICT(id) DO UPDATE SET value = excluded.value"#,
        )
        .bind(value as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
