//! Room-addressed delivery to connected sessions.
//!
//! Each rider and captain has a room; a session joins its room when its
//! WebSocket connects and leaves on disconnect. Delivery is best effort: a
//! full or closed channel drops the message.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::domain::{Actor, CaptainId, RiderId};

use super::events::RideEvent;

/// Per-connection buffer; slower consumers lose messages.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Rider(RiderId),
    Captain(CaptainId),
}

impl Room {
    /// The room `actor` listens on. Admins have none.
    pub fn for_actor(actor: &Actor) -> Option<Room> {
        match actor {
            Actor::Rider(id) => Some(Room::Rider(*id)),
            Actor::Captain(id) => Some(Room::Captain(*id)),
            Actor::Admin(_) => None,
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Rider(id) => write!(f, "rider:{id}"),
            Room::Captain(id) => write!(f, "captain:{id}"),
        }
    }
}

/// Somewhere to send ride events.
pub trait EventSink: Send + Sync {
    /// Deliver to every session in `room`. Returns how many received it.
    fn emit(&self, room: Room, event: &RideEvent) -> usize;
}

/// A live session's handle.
#[derive(Debug)]
pub struct Subscription {
    pub room: Room,
    pub id: u64,
    pub receiver: mpsc::Receiver<String>,
}

/// In-process connection registry.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    rooms: Mutex<HashMap<Room, Vec<(u64, mpsc::Sender<String>)>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `room`.
    pub fn subscribe(&self, room: Room) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.entry(room).or_default().push((id, sender));
        }
        tracing::debug!(%room, connection = id, "Session joined");
        Subscription { room, id, receiver }
    }

    /// Leave `room`.
    pub fn unsubscribe(&self, room: Room, id: u64) {
        if let Ok(mut rooms) = self.rooms.lock()
            && let Some(senders) = rooms.get_mut(&room)
        {
            senders.retain(|(conn, _)| *conn != id);
            if senders.is_empty() {
                rooms.remove(&room);
            }
        }
        tracing::debug!(%room, connection = id, "Session left");
    }

    pub fn connections(&self, room: Room) -> usize {
        self.rooms
            .lock()
            .map(|rooms| rooms.get(&room).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl EventSink for ConnectionRegistry {
    fn emit(&self, room: Room, event: &RideEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(event = event.name(), error = %e, "Failed to serialize event");
                return 0;
            }
        };

        let Ok(mut rooms) = self.rooms.lock() else {
            return 0;
        };
        let Some(senders) = rooms.get_mut(&room) else {
            tracing::trace!(%room, event = event.name(), "No sessions in room");
            return 0;
        };

        let mut delivered = 0;
        senders.retain(|(conn, sender)| match sender.try_send(payload.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%room, connection = conn, event = event.name(), "Session buffer full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if senders.is_empty() {
            rooms.remove(&room);
        }
        delivered
    }
}
