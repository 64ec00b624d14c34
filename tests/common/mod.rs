#![allow(dead_code)]

use axum::body::Body;
use chathub::db;
use chathub::gateway::heartbeat::Liveness;
use chathub::gateway::session::SessionSettings;
use chathub::models::room::{CreateRoom, MemberRole};
use chathub::models::user::CreateUser;
use chathub::routes;
use chathub::state::AppState;
use futures_util::StreamExt;
use http::{Method, Request};
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test server that owns an in-memory SQLite pool, a running hub and the
/// full AppState. Each instance is isolated, so tests can run in parallel.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_settings(SessionSettings {
            outbound_capacity: 256,
            liveness: Liveness::disabled(),
        })
        .await
    }

    pub async fn with_settings(settings: SessionSettings) -> Self {
        let pool = db::create_pool("sqlite::memory:")
            .await
            .expect("failed to create test pool");
        let state = AppState::new(pool, 1024, settings);
        Self { state }
    }

    /// Returns an Axum Router wired to this server's state for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns
    /// `host:port`.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("127.0.0.1:{}", addr.port())
    }

    pub async fn create_user(&self, name: &str) -> u64 {
        db::users::create_user(
            self.pool(),
            &CreateUser {
                display_name: name.to_string(),
            },
        )
        .await
        .expect("failed to create test user")
        .id
    }

    /// Create a room owned by `owner_id` with the given extra members.
    pub async fn create_room(&self, owner_id: u64, name: &str, members: &[u64]) -> u64 {
        let room = db::rooms::create_room(
            self.pool(),
            &CreateRoom {
                name: name.to_string(),
                description: None,
                owner_id,
                is_public: None,
            },
        )
        .await
        .expect("failed to create test room");
        for &user_id in members {
            db::rooms::add_member(self.pool(), room.id, user_id, MemberRole::Member)
                .await
                .expect("failed to add test member");
        }
        room.id
    }

    /// Open a live connection for `user_id` and wait until the hub has
    /// registered it.
    pub async fn connect(&self, addr: &str, user_id: u64) -> WsClient {
        let before = self.state.hub.session_count(user_id).await.unwrap();
        let (ws, _) = connect_async(format!("ws://{addr}/api/ws/{user_id}"))
            .await
            .expect("failed to connect");
        self.wait_for_sessions(user_id, before + 1).await;
        ws
    }

    pub async fn wait_for_sessions(&self, user_id: u64, expected: usize) {
        for _ in 0..200 {
            if self.state.hub.session_count(user_id).await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("user {user_id} never reached {expected} live session(s)");
    }
}

/// Next text frame from the server, parsed as JSON. Fails after 5 seconds.
pub async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    let read = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str::<serde_json::Value>(&text).unwrap(),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => panic!("expected text frame, got {other:?}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("timed out waiting for a frame")
}

/// Asserts nothing arrives on the socket within a short window.
pub async fn assert_silent(ws: &mut WsClient) {
    let result = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "expected no frame, got {result:?}");
}

pub fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Parse a response body into a `serde_json::Value`.
pub async fn parse_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
