//! Postgres (PostGIS) backed storage and raw measurement source.

mod rows;
mod source;
mod storage;

pub use source::PgSource;
pub use storage::PgStorage;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Largest number of bind parameters Postgres accepts in one statement.
pub const BIND_LIMIT: usize = 65_535;

/// Rows of `columns` binds each that fit in one statement.
pub fn rows_per_statement(columns: usize) -> usize {
    (BIND_LIMIT / columns.max(1)).max(1)
}

#[tracing::instrument(skip(url))]
pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(url)
        .await
        .context("could not connect to Postgres")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(9), 7_281);
        assert_eq!(rows_per_statement(1), BIND_LIMIT);
        assert_eq!(rows_per_statement(0), BIND_LIMIT);
    }
}
