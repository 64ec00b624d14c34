mod health;
pub mod messages;
pub mod rooms;
mod users;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Live connection
        .route("/ws/{id}", get(crate::gateway::ws_upgrade))
        // Direct messages
        .route("/messages", post(messages::submit_message))
        .route(
            "/messages/{user_id}/{other_id}",
            get(messages::direct_history),
        )
        // Rooms
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route("/rooms/invite", post(rooms::invite_member))
        .route("/rooms/remove", post(rooms::remove_member))
        .route("/rooms/role", post(rooms::update_member_role))
        .route("/rooms/{room_id}/members", get(rooms::list_members))
        .route(
            "/rooms/{room_id}/messages",
            get(rooms::room_history).post(rooms::submit_room_message),
        )
        // Presence
        .route("/heartbeat/{user_id}", post(users::heartbeat))
        .route("/users/{user_id}/presence", get(users::presence))
}
