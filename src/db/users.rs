use sqlx::{Row, SqlitePool};

use super::db_id;
use crate::error::AppError;
use crate::models::message::UserId;
use crate::models::user::{CreateUser, User};

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get::<i64, _>("id") as u64,
        display_name: row.get("display_name"),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
    }
}

pub async fn get_user(pool: &SqlitePool, user_id: UserId) -> Result<User, AppError> {
    let row = sqlx::query("SELECT id, display_name, last_seen, created_at FROM users WHERE id = ?")
        .bind(db_id(user_id)?)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_user".to_string()))?;

    Ok(row_to_user(row))
}

pub async fn create_user(pool: &SqlitePool, input: &CreateUser) -> Result<User, AppError> {
    let result = sqlx::query("INSERT INTO users (display_name) VALUES (?)")
        .bind(&input.display_name)
        .execute(pool)
        .await?;

    get_user(pool, result.last_insert_rowid() as u64).await
}

/// Record a heartbeat. Returns the new last-seen timestamp.
pub async fn touch_last_seen(pool: &SqlitePool, user_id: UserId) -> Result<String, AppError> {
    let now = super::now_timestamp();
    let result = sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
        .bind(&now)
        .bind(db_id(user_id)?)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("unknown_user".to_string()));
    }
    Ok(now)
}

/// Last-seen for a user, `None` when the user is unknown or never pinged.
pub async fn last_seen(pool: &SqlitePool, user_id: UserId) -> Result<Option<String>, AppError> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT last_seen FROM users WHERE id = ?")
            .bind(db_id(user_id)?)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}
