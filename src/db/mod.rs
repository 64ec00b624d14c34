pub mod messages;
pub mod rooms;
pub mod users;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::AppError;

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    // Every connection to `:memory:` is its own database, so in-memory pools
    // are pinned to one connection that is never recycled.
    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}

/// RFC 3339 UTC with millisecond precision. Fixed width, so stored values
/// sort lexically in time order.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// SQLite integers are signed; ids past `i64::MAX` cannot be stored.
pub fn db_id(id: u64) -> Result<i64, AppError> {
    i64::try_from(id).map_err(|_| AppError::BadRequest(format!("id {id} is out of range")))
}
