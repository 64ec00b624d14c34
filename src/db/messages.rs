use sqlx::{Row, SqlitePool};

use super::db_id;
use crate::error::AppError;
use crate::models::message::{Message, MessageKind, NewMessage, RoomId, Target, UserId};

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> Message {
    let recipient_id: Option<i64> = row.get("recipient_id");
    let room_id: Option<i64> = row.get("room_id");
    let kind: String = row.get("type");
    Message {
        id: row.get::<i64, _>("id") as u64,
        sender_id: row.get::<i64, _>("sender_id") as u64,
        recipient_id: recipient_id.unwrap_or(0) as u64,
        room_id: room_id.unwrap_or(0) as u64,
        content: row.get("content"),
        kind: MessageKind::parse(&kind).unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}

const SELECT_MESSAGES: &str =
    "SELECT id, sender_id, recipient_id, room_id, content, type, created_at FROM messages";

pub async fn get_message(pool: &SqlitePool, message_id: i64) -> Result<Message, AppError> {
    let row = sqlx::query(&format!("{SELECT_MESSAGES} WHERE id = ?"))
        .bind(message_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_message".to_string()))?;

    Ok(row_to_message(row))
}

/// Insert a message. Room messages require the room to exist.
pub async fn create_message(pool: &SqlitePool, input: &NewMessage) -> Result<Message, AppError> {
    if let Target::Room { room_id } = input.target {
        super::rooms::get_room(pool, room_id).await?;
    }
    let (recipient_id, room_id) = match input.target {
        Target::Direct { recipient_id } => (Some(db_id(recipient_id)?), None),
        Target::Room { room_id } => (None, Some(db_id(room_id)?)),
    };
    let created_at = super::now_timestamp();

    let result = sqlx::query(
        "INSERT INTO messages (sender_id, recipient_id, room_id, content, type, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(db_id(input.sender_id)?)
    .bind(recipient_id)
    .bind(room_id)
    .bind(&input.content)
    .bind(input.kind.as_str())
    .bind(&created_at)
    .execute(pool)
    .await?;

    get_message(pool, result.last_insert_rowid()).await
}

/// All direct messages exchanged between two users, oldest first.
pub async fn list_direct(
    pool: &SqlitePool,
    user_a: UserId,
    user_b: UserId,
) -> Result<Vec<Message>, AppError> {
    let rows = sqlx::query(&format!(
        "{SELECT_MESSAGES} WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?) ORDER BY created_at ASC, id ASC"
    ))
    .bind(db_id(user_a)?)
    .bind(db_id(user_b)?)
    .bind(db_id(user_b)?)
    .bind(db_id(user_a)?)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_message).collect())
}

pub async fn list_room(pool: &SqlitePool, room_id: RoomId) -> Result<Vec<Message>, AppError> {
    let rows = sqlx::query(&format!(
        "{SELECT_MESSAGES} WHERE room_id = ? ORDER BY created_at ASC, id ASC"
    ))
    .bind(db_id(room_id)?)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_message).collect())
}
