use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::models::message::{CreateRoomMessage, Message, NewMessage, RoomId, Target};
use crate::models::room::{
    CreateRoom, MemberRole, MembershipChange, Room, RoomMember, UpdateMemberRole,
};
use crate::models::DataResponse;
use crate::state::AppState;

pub async fn create_room(
    State(state): State<AppState>,
    Json(input): Json<CreateRoom>,
) -> Result<(StatusCode, Json<DataResponse<Room>>), AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("room name is required".to_string()));
    }
    if input.owner_id == 0 {
        return Err(AppError::BadRequest("ownerId is required".to_string()));
    }
    let room = db::rooms::create_room(&state.db, &input).await?;
    tracing::debug!(room_id = room.id, owner_id = room.owner_id, "room created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(room))))
}

pub async fn list_rooms(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Vec<Room>>>, AppError> {
    let rooms = db::rooms::list_rooms(&state.db).await?;
    Ok(Json(DataResponse::new(rooms)))
}

pub async fn invite_member(
    State(state): State<AppState>,
    Json(input): Json<MembershipChange>,
) -> Result<(StatusCode, Json<DataResponse<RoomMember>>), AppError> {
    if input.user_id == 0 {
        return Err(AppError::BadRequest("userId is required".to_string()));
    }
    let member =
        db::rooms::add_member(&state.db, input.room_id, input.user_id, MemberRole::Member).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(member))))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Json(input): Json<MembershipChange>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::rooms::remove_member(&state.db, input.room_id, input.user_id).await?;
    Ok(Json(serde_json::json!({ "data": null })))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    Json(input): Json<UpdateMemberRole>,
) -> Result<Json<DataResponse<RoomMember>>, AppError> {
    let member =
        db::rooms::update_member_role(&state.db, input.room_id, input.user_id, input.role).await?;
    Ok(Json(DataResponse::new(member)))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<DataResponse<Vec<RoomMember>>>, AppError> {
    db::rooms::get_room(&state.db, room_id).await?;
    let members = db::rooms::list_members(&state.db, room_id).await?;
    Ok(Json(DataResponse::new(members)))
}

/// `POST /api/rooms/{room_id}/messages`: persisted, then pushed to every
/// live member except the sender.
pub async fn submit_room_message(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(input): Json<CreateRoomMessage>,
) -> Result<(StatusCode, Json<DataResponse<Message>>), AppError> {
    if input.sender_id == 0 || input.content.is_empty() {
        return Err(AppError::BadRequest(
            "senderId and content are required".to_string(),
        ));
    }
    let message = NewMessage {
        sender_id: input.sender_id,
        target: Target::Room { room_id },
        content: input.content,
        kind: input.kind,
    };
    let stored = state.router.route(message).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(stored))))
}

pub async fn room_history(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<DataResponse<Vec<Message>>>, AppError> {
    db::rooms::get_room(&state.db, room_id).await?;
    let messages = state.store.query_room(room_id).await?;
    Ok(Json(DataResponse::new(messages)))
}
