pub mod connection;
pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod hub;
pub mod session;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;

use crate::models::message::UserId;
use crate::state::AppState;
use connection::FrameWriter;
use events::close_code;
use session::ClientSession;

/// `GET /api/ws/{id}`. The user id is taken from the path as-is; a zero or
/// unparsable id gets the socket closed without registering anything.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(raw_user_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let user_id = parse_user_id(&raw_user_id);
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

fn parse_user_id(raw: &str) -> Option<UserId> {
    raw.parse::<UserId>()
        .ok()
        .filter(|id| *id != 0 && *id <= i64::MAX as UserId)
}

async fn handle_socket(socket: WebSocket, user_id: Option<UserId>, state: AppState) {
    let (reader, mut writer) = connection::split(socket);

    let Some(user_id) = user_id else {
        tracing::debug!("rejecting connection without a valid user id");
        writer.close(close_code::INVALID_USER, "invalid user id").await;
        return;
    };

    let session = ClientSession::new(user_id, state.hub.clone(), state.router.clone(), state.session);
    session.run(reader, writer).await;
}
