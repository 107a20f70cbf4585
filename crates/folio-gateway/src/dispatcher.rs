use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use folio_types::events::GatewayEvent;

/// Fans change events out to every open gateway connection.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection receives every event and filters by visibility
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Open connections per user: user_id -> count
    sessions: RwLock<HashMap<Uuid, usize>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients. No listeners is fine.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub async fn session_opened(&self, user_id: Uuid) {
        *self.inner.sessions.write().await.entry(user_id).or_default() += 1;
    }

    pub async fn session_closed(&self, user_id: Uuid) {
        let mut sessions = self.inner.sessions.write().await;
        if let Some(count) = sessions.get_mut(&user_id) {
            *count -= 1;
            if *count == 0 {
                sessions.remove(&user_id);
            }
        }
    }

    /// Number of distinct users with at least one open connection.
    pub async fn connected_users(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}
