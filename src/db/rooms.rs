use sqlx::{Row, SqlitePool};

use super::db_id;
use crate::error::AppError;
use crate::models::message::{RoomId, UserId};
use crate::models::room::{CreateRoom, MemberRole, Room, RoomMember};

fn row_to_room(row: sqlx::sqlite::SqliteRow) -> Room {
    Room {
        id: row.get::<i64, _>("id") as u64,
        name: row.get("name"),
        description: row.get("description"),
        owner_id: row.get::<i64, _>("owner_id") as u64,
        is_public: row.get("is_public"),
        created_at: row.get("created_at"),
    }
}

fn row_to_member(row: sqlx::sqlite::SqliteRow) -> RoomMember {
    let role: String = row.get("role");
    RoomMember {
        room_id: row.get::<i64, _>("room_id") as u64,
        user_id: row.get::<i64, _>("user_id") as u64,
        role: MemberRole::from_db(&role),
        joined_at: row.get("created_at"),
    }
}

const SELECT_ROOMS: &str =
    "SELECT id, name, description, owner_id, is_public, created_at FROM rooms";

pub async fn get_room(pool: &SqlitePool, room_id: RoomId) -> Result<Room, AppError> {
    let row = sqlx::query(&format!("{SELECT_ROOMS} WHERE id = ?"))
        .bind(db_id(room_id)?)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_room".to_string()))?;

    Ok(row_to_room(row))
}

/// Public rooms only; private rooms are reachable by id.
pub async fn list_rooms(pool: &SqlitePool) -> Result<Vec<Room>, AppError> {
    let rows = sqlx::query(&format!("{SELECT_ROOMS} WHERE is_public = 1 ORDER BY id ASC"))
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(row_to_room).collect())
}

/// Create a room and enrol its owner as admin in one transaction.
pub async fn create_room(pool: &SqlitePool, input: &CreateRoom) -> Result<Room, AppError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO rooms (name, description, owner_id, is_public) VALUES (?, ?, ?, ?)",
    )
    .bind(&input.name)
    .bind(input.description.as_deref().unwrap_or(""))
    .bind(db_id(input.owner_id)?)
    .bind(input.is_public.unwrap_or(true))
    .execute(&mut *tx)
    .await?;
    let room_id = result.last_insert_rowid();

    sqlx::query("INSERT INTO room_members (room_id, user_id, role) VALUES (?, ?, ?)")
        .bind(room_id)
        .bind(db_id(input.owner_id)?)
        .bind(MemberRole::Admin.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    get_room(pool, room_id as u64).await
}

pub async fn add_member(
    pool: &SqlitePool,
    room_id: RoomId,
    user_id: UserId,
    role: MemberRole,
) -> Result<RoomMember, AppError> {
    get_room(pool, room_id).await?;

    sqlx::query("INSERT INTO room_members (room_id, user_id, role) VALUES (?, ?, ?)")
        .bind(db_id(room_id)?)
        .bind(db_id(user_id)?)
        .bind(role.as_str())
        .execute(pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("user is already a member of this room".to_string())
            }
            other => other,
        })?;

    get_member(pool, room_id, user_id).await
}

pub async fn get_member(
    pool: &SqlitePool,
    room_id: RoomId,
    user_id: UserId,
) -> Result<RoomMember, AppError> {
    let row = sqlx::query(
        "SELECT room_id, user_id, role, created_at FROM room_members WHERE room_id = ? AND user_id = ?",
    )
    .bind(db_id(room_id)?)
    .bind(db_id(user_id)?)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("unknown_member".to_string()))?;

    Ok(row_to_member(row))
}

/// Remove a member. Removing a non-member is a no-op.
pub async fn remove_member(
    pool: &SqlitePool,
    room_id: RoomId,
    user_id: UserId,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
        .bind(db_id(room_id)?)
        .bind(db_id(user_id)?)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_member_role(
    pool: &SqlitePool,
    room_id: RoomId,
    user_id: UserId,
    role: MemberRole,
) -> Result<RoomMember, AppError> {
    let result =
        sqlx::query("UPDATE room_members SET role = ? WHERE room_id = ? AND user_id = ?")
            .bind(role.as_str())
            .bind(db_id(room_id)?)
            .bind(db_id(user_id)?)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("unknown_member".to_string()));
    }
    get_member(pool, room_id, user_id).await
}

pub async fn list_members(pool: &SqlitePool, room_id: RoomId) -> Result<Vec<RoomMember>, AppError> {
    let rows = sqlx::query(
        "SELECT room_id, user_id, role, created_at FROM room_members WHERE room_id = ? ORDER BY created_at ASC, user_id ASC",
    )
    .bind(db_id(room_id)?)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(row_to_member).collect())
}

pub async fn list_member_ids(pool: &SqlitePool, room_id: RoomId) -> Result<Vec<UserId>, AppError> {
    let rows = sqlx::query_as::<_, (i64,)>("SELECT user_id FROM room_members WHERE room_id = ?")
        .bind(db_id(room_id)?)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.0 as u64).collect())
}
