use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::models::message::{Message, NewMessage, RoomId, UserId};

/// Durable message log and room-membership lookup used by the router.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message. The store assigns `id` and `createdAt`. A room
    /// message for an unknown room fails with `NotFound` and is not stored.
    async fn create(&self, message: &NewMessage) -> Result<Message, AppError>;

    /// Direct messages between two users in either direction, oldest first.
    async fn query_direct(&self, user_a: UserId, user_b: UserId) -> Result<Vec<Message>, AppError>;

    /// Messages posted to a room, oldest first.
    async fn query_room(&self, room_id: RoomId) -> Result<Vec<Message>, AppError>;

    async fn resolve_room_members(&self, room_id: RoomId) -> Result<Vec<UserId>, AppError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create(&self, message: &NewMessage) -> Result<Message, AppError> {
        db::messages::create_message(&self.pool, message).await
    }

    async fn query_direct(&self, user_a: UserId, user_b: UserId) -> Result<Vec<Message>, AppError> {
        db::messages::list_direct(&self.pool, user_a, user_b).await
    }

    async fn query_room(&self, room_id: RoomId) -> Result<Vec<Message>, AppError> {
        db::messages::list_room(&self.pool, room_id).await
    }

    async fn resolve_room_members(&self, room_id: RoomId) -> Result<Vec<UserId>, AppError> {
        db::rooms::list_member_ids(&self.pool, room_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{MessageKind, Target};
    use crate::models::room::CreateRoom;

    async fn store() -> (SqlitePool, SqliteStore) {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        (pool.clone(), SqliteStore::new(pool))
    }

    fn direct(sender_id: UserId, recipient_id: UserId, content: &str) -> NewMessage {
        NewMessage {
            sender_id,
            target: Target::Direct { recipient_id },
            content: content.to_string(),
            kind: MessageKind::Text,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let (_pool, store) = store().await;
        let stored = store.create(&direct(7, 5, "hi")).await.unwrap();
        assert!(stored.id > 0);
        assert!(!stored.created_at.is_empty());
        assert_eq!(stored.sender_id, 7);
        assert_eq!(stored.recipient_id, 5);
        assert_eq!(stored.room_id, 0);
        assert_eq!(stored.content, "hi");
    }

    #[tokio::test]
    async fn test_query_direct_is_ordered_and_symmetric() {
        let (_pool, store) = store().await;
        store.create(&direct(5, 7, "one")).await.unwrap();
        store.create(&direct(7, 5, "two")).await.unwrap();
        store.create(&direct(5, 9, "elsewhere")).await.unwrap();
        store.create(&direct(5, 7, "three")).await.unwrap();

        let forward = store.query_direct(5, 7).await.unwrap();
        let backward = store.query_direct(7, 5).await.unwrap();
        let contents: Vec<_> = forward.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn test_room_messages_and_members() {
        let (pool, store) = store().await;
        let room = db::rooms::create_room(
            &pool,
            &CreateRoom {
                name: "satsang".into(),
                description: None,
                owner_id: 1,
                is_public: None,
            },
        )
        .await
        .unwrap();
        db::rooms::add_member(&pool, room.id, 2, crate::models::room::MemberRole::Member)
            .await
            .unwrap();

        let mut members = store.resolve_room_members(room.id).await.unwrap();
        members.sort();
        assert_eq!(members, vec![1, 2]);

        let msg = NewMessage {
            sender_id: 2,
            target: Target::Room { room_id: room.id },
            content: "namaste".into(),
            kind: MessageKind::Text,
        };
        let stored = store.create(&msg).await.unwrap();
        assert_eq!(stored.room_id, room.id);
        assert_eq!(stored.recipient_id, 0);

        let history = store.query_room(room.id).await.unwrap();
        assert_eq!(history, vec![stored]);
        assert!(store.query_direct(2, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_room_message_for_unknown_room_is_rejected() {
        let (pool, store) = store().await;
        let msg = NewMessage {
            sender_id: 2,
            target: Target::Room { room_id: 999 },
            content: "ghost".into(),
            kind: MessageKind::Text,
        };
        let err = store.create(&msg).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_id_is_rejected() {
        let (_pool, store) = store().await;
        let err = store.create(&direct(7, u64::MAX, "overflow")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
