use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::events::ServerFrame;
use super::session::{CloseReason, Lifecycle};
use crate::models::message::{Message, UserId};

pub type SessionId = Uuid;

/// The hub's view of one client session.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub user_id: UserId,
    outbound: mpsc::Sender<ServerFrame>,
    lifecycle: Arc<Lifecycle>,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        user_id: UserId,
        outbound: mpsc::Sender<ServerFrame>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            id,
            user_id,
            outbound,
            lifecycle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    Closed,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::Closed => f.write_str("hub is not running"),
        }
    }
}

impl std::error::Error for HubError {}

enum HubCommand {
    Register(SessionHandle),
    Unregister {
        user_id: UserId,
        session_id: SessionId,
    },
    Deliver {
        targets: Vec<UserId>,
        frame: ServerFrame,
    },
    Reply {
        user_id: UserId,
        session_id: SessionId,
        frame: ServerFrame,
    },
    SessionCount {
        user_id: UserId,
        reply: oneshot::Sender<usize>,
    },
}

#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| HubError::Closed)
    }

    /// Add a session to its user's set. Re-registering the same session id
    /// replaces the entry.
    pub async fn register(&self, session: SessionHandle) -> Result<(), HubError> {
        self.send(HubCommand::Register(session)).await
    }

    /// Remove a session. Unknown sessions are ignored.
    pub async fn unregister(&self, user_id: UserId, session_id: SessionId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister {
            user_id,
            session_id,
        })
        .await
    }

    /// Queue `message` on every live session of every target user.
    pub async fn deliver(&self, targets: Vec<UserId>, message: Message) -> Result<(), HubError> {
        self.send(HubCommand::Deliver {
            targets,
            frame: ServerFrame::Message(Arc::new(message)),
        })
        .await
    }

    /// Queue a frame on one specific session.
    pub async fn reply(
        &self,
        user_id: UserId,
        session_id: SessionId,
        frame: ServerFrame,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Reply {
            user_id,
            session_id,
            frame,
        })
        .await
    }

    pub async fn session_count(&self, user_id: UserId) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::SessionCount { user_id, reply }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// Registry of live sessions and the only writer of their outbound queues.
///
/// All registry mutation and every delivery decision runs inside one task
/// draining a bounded control channel. Nothing in the loop awaits on a
/// session; a session whose queue is full is evicted instead.
pub struct Hub {
    registry: HashMap<UserId, HashMap<SessionId, SessionHandle>>,
    rx: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Start the control loop. It runs until every handle is dropped.
    pub fn spawn(capacity: usize) -> HubHandle {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let hub = Hub {
            registry: HashMap::new(),
            rx,
        };
        tokio::spawn(hub.run());
        HubHandle { tx }
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }

        let remaining: usize = self.registry.values().map(HashMap::len).sum();
        tracing::info!("hub stopped, closing {remaining} session(s)");
        for session in self.registry.drain().flat_map(|(_, sessions)| sessions.into_values()) {
            session.lifecycle.close(CloseReason::HubShutdown);
        }
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(session) => self.register(session),
            HubCommand::Unregister {
                user_id,
                session_id,
            } => {
                self.unregister(user_id, session_id);
            }
            HubCommand::Deliver { targets, frame } => self.deliver(&targets, &frame),
            HubCommand::Reply {
                user_id,
                session_id,
                frame,
            } => self.offer(user_id, &[session_id], &frame),
            HubCommand::SessionCount { user_id, reply } => {
                let count = self.registry.get(&user_id).map_or(0, HashMap::len);
                let _ = reply.send(count);
            }
        }
    }

    fn register(&mut self, session: SessionHandle) {
        tracing::debug!(user_id = session.user_id, session_id = %session.id, "session registered");
        self.registry
            .entry(session.user_id)
            .or_default()
            .insert(session.id, session);
    }

    fn unregister(&mut self, user_id: UserId, session_id: SessionId) -> Option<SessionHandle> {
        let sessions = self.registry.get_mut(&user_id)?;
        let removed = sessions.remove(&session_id);
        if sessions.is_empty() {
            self.registry.remove(&user_id);
        }
        if removed.is_some() {
            tracing::debug!(user_id, session_id = %session_id, "session unregistered");
        }
        removed
    }

    fn deliver(&mut self, targets: &[UserId], frame: &ServerFrame) {
        let mut seen = HashSet::with_capacity(targets.len());
        for &user_id in targets {
            if !seen.insert(user_id) {
                continue;
            }
            let Some(sessions) = self.registry.get(&user_id) else {
                continue;
            };
            let session_ids: Vec<SessionId> = sessions.keys().copied().collect();
            self.offer(user_id, &session_ids, frame);
        }
    }

    /// Try to enqueue on each listed session of one user, evicting those
    /// that cannot take it.
    fn offer(&mut self, user_id: UserId, session_ids: &[SessionId], frame: &ServerFrame) {
        let mut evicted = Vec::new();
        if let Some(sessions) = self.registry.get(&user_id) {
            for session_id in session_ids {
                let Some(session) = sessions.get(session_id) else {
                    continue;
                };
                match session.outbound.try_send(frame.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        evicted.push((*session_id, CloseReason::SlowConsumer));
                    }
                    Err(TrySendError::Closed(_)) => {
                        evicted.push((*session_id, CloseReason::TransportError));
                    }
                }
            }
        }

        for (session_id, reason) in evicted {
            if let Some(session) = self.unregister(user_id, session_id) {
                if reason == CloseReason::SlowConsumer {
                    tracing::warn!(
                        user_id,
                        session_id = %session_id,
                        "outbound queue full, disconnecting slow session"
                    );
                }
                session.lifecycle.close(reason);
            }
        }
    }
}
