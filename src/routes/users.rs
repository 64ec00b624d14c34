use axum::extract::{Path, State};
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::models::message::UserId;
use crate::models::user::Presence;
use crate::models::DataResponse;
use crate::state::AppState;

/// `POST /api/heartbeat/{user_id}`: refresh the stored last-seen time.
/// This only feeds presence display; it does not keep sessions alive.
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<serde_json::Value>, AppError> {
    let last_seen = db::users::touch_last_seen(&state.db, user_id).await?;
    Ok(Json(serde_json::json!({
        "data": { "userId": user_id, "lastSeen": last_seen }
    })))
}

pub async fn presence(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<DataResponse<Presence>>, AppError> {
    let sessions = state.hub.session_count(user_id).await?;
    let last_seen = db::users::last_seen(&state.db, user_id).await?;
    Ok(Json(DataResponse::new(Presence {
        user_id,
        online: sessions > 0,
        sessions,
        last_seen,
    })))
}
