use std::sync::Arc;

use super::hub::HubHandle;
use crate::error::AppError;
use crate::models::message::{Message, NewMessage, Target, UserId};
use crate::store::MessageStore;

/// Turns one inbound message into a durable record and a live delivery.
///
/// Persistence comes first: if the store rejects the message nothing is
/// delivered and the error goes back to the caller. Once the record exists
/// the call succeeds; problems with live delivery are logged, since the
/// recipient can still read the message from history.
#[derive(Clone)]
pub struct MessageRouter {
    store: Arc<dyn MessageStore>,
    hub: HubHandle,
}

impl MessageRouter {
    pub fn new(store: Arc<dyn MessageStore>, hub: HubHandle) -> Self {
        Self { store, hub }
    }

    pub async fn route(&self, message: NewMessage) -> Result<Message, AppError> {
        let stored = self.store.create(&message).await?;

        let targets = match self.delivery_set(&stored).await {
            Ok(targets) => targets,
            Err(e) => {
                tracing::error!(message_id = stored.id, "could not resolve recipients: {e}");
                return Ok(stored);
            }
        };

        if !targets.is_empty() {
            if let Err(e) = self.hub.deliver(targets, stored.clone()).await {
                tracing::error!(message_id = stored.id, "live delivery skipped: {e}");
            }
        }

        Ok(stored)
    }

    /// The recipient of a direct message, or every member of the room except
    /// the sender.
    async fn delivery_set(&self, message: &Message) -> Result<Vec<UserId>, AppError> {
        match message.target() {
            Target::Direct { recipient_id } => Ok(vec![recipient_id]),
            Target::Room { room_id } => {
                let members = self.store.resolve_room_members(room_id).await?;
                Ok(members
                    .into_iter()
                    .filter(|&user_id| user_id != message.sender_id)
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::events::ServerFrame;
    use crate::gateway::hub::{Hub, SessionHandle};
    use crate::gateway::session::Lifecycle;
    use crate::models::message::{MessageKind, RoomId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct FakeStore {
        fail_create: bool,
        fail_members: bool,
        members: Vec<UserId>,
        created: AtomicUsize,
    }

    impl FakeStore {
        fn new(members: Vec<UserId>) -> Self {
            Self {
                fail_create: false,
                fail_members: false,
                members,
                created: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MessageStore for FakeStore {
        async fn create(&self, message: &NewMessage) -> Result<Message, AppError> {
            if self.fail_create {
                return Err(AppError::Internal("disk full".into()));
            }
            let id = self.created.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            let (recipient_id, room_id) = match message.target {
                Target::Direct { recipient_id } => (recipient_id, 0),
                Target::Room { room_id } => (0, room_id),
            };
            Ok(Message {
                id,
                sender_id: message.sender_id,
                recipient_id,
                room_id,
                content: message.content.clone(),
                kind: message.kind,
                created_at: "2026-01-01T00:00:00.000Z".into(),
            })
        }

        async fn query_direct(&self, _a: UserId, _b: UserId) -> Result<Vec<Message>, AppError> {
            Ok(vec![])
        }

        async fn query_room(&self, _room_id: RoomId) -> Result<Vec<Message>, AppError> {
            Ok(vec![])
        }

        async fn resolve_room_members(&self, _room_id: RoomId) -> Result<Vec<UserId>, AppError> {
            if self.fail_members {
                return Err(AppError::Internal("lookup failed".into()));
            }
            Ok(self.members.clone())
        }
    }

    async fn listen(hub: &HubHandle, user_id: UserId) -> mpsc::Receiver<ServerFrame> {
        let (tx, rx) = mpsc::channel(8);
        hub.register(SessionHandle::new(
            Uuid::new_v4(),
            user_id,
            tx,
            Arc::new(Lifecycle::new()),
        ))
        .await
        .unwrap();
        rx
    }

    fn direct(sender_id: UserId, recipient_id: UserId) -> NewMessage {
        NewMessage {
            sender_id,
            target: Target::Direct { recipient_id },
            content: "hi".into(),
            kind: MessageKind::Text,
        }
    }

    fn room(sender_id: UserId, room_id: RoomId) -> NewMessage {
        NewMessage {
            sender_id,
            target: Target::Room { room_id },
            content: "hello room".into(),
            kind: MessageKind::Text,
        }
    }

    #[tokio::test]
    async fn test_direct_message_delivered_to_recipient_only() {
        let hub = Hub::spawn(16);
        let mut recipient = listen(&hub, 5).await;
        let mut sender = listen(&hub, 7).await;
        let router = MessageRouter::new(Arc::new(FakeStore::new(vec![])), hub.clone());

        let stored = router.route(direct(7, 5)).await.unwrap();
        assert_eq!(stored.id, 1);
        hub.session_count(5).await.unwrap();

        match recipient.recv().await.unwrap() {
            ServerFrame::Message(m) => assert_eq!(*m, stored),
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(sender.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_persistence_failure_suppresses_delivery() {
        let hub = Hub::spawn(16);
        let mut recipient = listen(&hub, 5).await;
        let mut store = FakeStore::new(vec![]);
        store.fail_create = true;
        let router = MessageRouter::new(Arc::new(store), hub.clone());

        let err = router.route(direct(7, 5)).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        hub.session_count(5).await.unwrap();
        assert!(recipient.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_room_message_skips_sender() {
        let hub = Hub::spawn(16);
        let mut sender = listen(&hub, 1).await;
        let mut member = listen(&hub, 2).await;
        let router = MessageRouter::new(Arc::new(FakeStore::new(vec![1, 2, 3])), hub.clone());

        router.route(room(1, 10)).await.unwrap();
        hub.session_count(1).await.unwrap();

        match member.recv().await.unwrap() {
            ServerFrame::Message(m) => assert_eq!(m.room_id, 10),
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(sender.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_membership_failure_still_returns_stored_message() {
        let hub = Hub::spawn(16);
        let mut member = listen(&hub, 2).await;
        let mut store = FakeStore::new(vec![2]);
        store.fail_members = true;
        let router = MessageRouter::new(Arc::new(store), hub.clone());

        let stored = router.route(room(1, 10)).await.unwrap();
        assert_eq!(stored.room_id, 10);
        hub.session_count(2).await.unwrap();
        assert!(member.try_recv().is_err());
    }
}
