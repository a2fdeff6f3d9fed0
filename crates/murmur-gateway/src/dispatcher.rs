use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use murmur_types::events::{CloseReason, RoomEvent};

/// An event tagged with the room it belongs to.
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub room_id: Uuid,
    pub event: RoomEvent,
}

/// Fans room events out to connected clients and tracks who is online.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection receives every message and drops other rooms' events
    broadcast_tx: broadcast::Sender<Arc<RoomMessage>>,

    /// room_id -> display name -> open connection count
    presence: RwLock<HashMap<Uuid, HashMap<String, usize>>>,
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
                presence: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoomMessage>> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event to everyone connected to `room_id`.
    pub fn publish(&self, room_id: Uuid, event: RoomEvent) {
        // No receivers is fine: nobody is watching the room right now.
        let _ = self.inner.broadcast_tx.send(Arc::new(RoomMessage { room_id, event }));
    }

    /// Register a connection for `display_name` and announce presence.
    pub async fn join(&self, room_id: Uuid, display_name: &str) {
        {
            let mut presence = self.inner.presence.write().await;
            *presence
                .entry(room_id)
                .or_default()
                .entry(display_name.to_string())
                .or_default() += 1;
        }
        self.announce_presence(room_id).await;
    }

    /// Drop one connection for `display_name`. The name stays online while it
    /// has other connections open.
    pub async fn leave(&self, room_id: Uuid, display_name: &str) {
        let changed = {
            let mut presence = self.inner.presence.write().await;
            let Some(names) = presence.get_mut(&room_id) else {
                return;
            };

            let gone = match names.get(display_name).copied() {
                Some(count) if count > 1 => {
                    names.insert(display_name.to_string(), count - 1);
                    false
                }
                Some(_) => {
                    names.remove(display_name);
                    true
                }
                None => false,
            };

            if names.is_empty() {
                presence.remove(&room_id);
            }
            gone
        };

        if changed {
            self.announce_presence(room_id).await;
        }
    }

    /// Display names with at least one open connection, sorted.
    pub async fn online(&self, room_id: Uuid) -> Vec<String> {
        let presence = self.inner.presence.read().await;
        let mut names: Vec<String> = presence
            .get(&room_id)
            .map(|names| names.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Tell every client the room is gone and forget its presence state.
    pub async fn close_room(&self, room_id: Uuid, reason: CloseReason) {
        self.publish(room_id, RoomEvent::RoomClosed { reason });
        self.inner.presence.write().await.remove(&room_id);
    }

    async fn announce_presence(&self, room_id: Uuid) {
        let online = self.online(room_id).await;
        self.publish(room_id, RoomEvent::PresenceUpdate { online });
    }
}
