use sqlx::SqlitePool;
use std::sync::Arc;

use crate::gateway::dispatcher::MessageRouter;
use crate::gateway::hub::{Hub, HubHandle};
use crate::gateway::session::SessionSettings;
use crate::store::{MessageStore, SqliteStore};

/// Everything a handler needs, built once at startup and cloned into each
/// request and socket task.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub store: Arc<dyn MessageStore>,
    pub hub: HubHandle,
    pub router: MessageRouter,
    pub session: SessionSettings,
}

impl AppState {
    /// Spawns the hub. Must be called from within a tokio runtime.
    pub fn new(db: SqlitePool, hub_capacity: usize, session: SessionSettings) -> Self {
        let store: Arc<dyn MessageStore> = Arc::new(SqliteStore::new(db.clone()));
        let hub = Hub::spawn(hub_capacity);
        let router = MessageRouter::new(store.clone(), hub.clone());
        Self {
            db,
            store,
            hub,
            router,
            session,
        }
    }
}
