use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::error::AppError;
use crate::models::message::{Envelope, Message, UserId};
use crate::models::DataResponse;
use crate::state::AppState;

/// `POST /api/messages`: submit a direct message without a live connection.
/// The stored record is also pushed to the recipient's live sessions.
pub async fn submit_message(
    State(state): State<AppState>,
    Json(input): Json<Envelope>,
) -> Result<(StatusCode, Json<DataResponse<Message>>), AppError> {
    if input.sender_id == 0 || input.recipient_id == 0 || input.content.is_empty() {
        return Err(AppError::BadRequest(
            "senderId, recipientId and content are required".to_string(),
        ));
    }
    let message = input.into_new_message()?;
    let stored = state.router.route(message).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(stored))))
}

/// `GET /api/messages/{user_id}/{other_id}`: the conversation between two
/// users, oldest first.
pub async fn direct_history(
    State(state): State<AppState>,
    Path((user_id, other_id)): Path<(UserId, UserId)>,
) -> Result<Json<DataResponse<Vec<Message>>>, AppError> {
    let messages = state.store.query_direct(user_id, other_id).await?;
    Ok(Json(DataResponse::new(messages)))
}
