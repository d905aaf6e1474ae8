//! Process-wide registry of live connections and the users behind them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc::UnboundedSender;

use crate::UserId;

pub type ConnectionId = u64;

/// Event broadcast to every live connection when a user goes offline.
pub trait PresenceEvent: 'static + Clone + Send {
    fn offline(user_id: UserId) -> Self;
}

/// Sending half of one live connection.
#[derive(Debug)]
pub struct ConnectionHandle<T> {
    id: ConnectionId,
    sender: UnboundedSender<T>,
}

impl<T> Clone for ConnectionHandle<T> {
    fn clone(&self) -> Self {
        ConnectionHandle { id: self.id, sender: self.sender.clone() }
    }
}

impl<T> ConnectionHandle<T> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Best effort; `false` once the connection's writer has gone away.
    pub fn send(&self, event: T) -> bool {
        self.sender.send(event).is_ok()
    }
}

struct Sessions<T> {
    live: HashMap<ConnectionId, ConnectionHandle<T>>,
    // registration order per user, the last entry receives pushes
    users: HashMap<UserId, Vec<ConnectionHandle<T>>>,
}

pub struct SessionRegistry<T> {
    sessions: RwLock<Sessions<T>>,
    next_id: AtomicU64,
}

impl<T: PresenceEvent> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PresenceEvent> SessionRegistry<T> {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: RwLock::new(Sessions { live: HashMap::new(), users: HashMap::new() }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Tracks a freshly opened, not yet authenticated connection so it
    /// receives broadcasts.
    pub fn attach(&self, sender: UnboundedSender<T>) -> ConnectionHandle<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ConnectionHandle { id, sender };
        self.write().live.insert(id, handle.clone());
        handle
    }

    pub fn detach(&self, connection_id: ConnectionId) {
        self.write().live.remove(&connection_id);
    }

    /// Associates the user with the connection. Earlier connections of the
    /// same user stay registered but stop receiving pushes.
    pub fn register(&self, user_id: UserId, connection: ConnectionHandle<T>) {
        let mut sessions = self.write();
        let connections = sessions.users.entry(user_id).or_default();
        connections.retain(|known| known.id != connection.id);
        connections.push(connection);
    }

    /// Removes this one connection of the user. When it was the user's last
    /// one, the user goes offline and everyone still connected is told so.
    /// Returns whether the user went offline.
    pub fn unregister(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let went_offline = {
            let mut sessions = self.write();
            let Some(connections) = sessions.users.get_mut(user_id) else {
                return false;
            };
            let before = connections.len();
            connections.retain(|known| known.id != connection_id);
            if connections.len() == before {
                return false;
            }
            if connections.is_empty() {
                sessions.users.remove(user_id);
                true
            } else {
                false
            }
        };

        if went_offline {
            let reached = self.broadcast(T::offline(*user_id));
            tracing::debug!(%user_id, reached, "user went offline");
        }
        went_offline
    }

    pub fn lookup(&self, user_id: &UserId) -> Option<ConnectionHandle<T>> {
        self.read()
            .users
            .get(user_id)
            .and_then(|connections| connections.last())
            .cloned()
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.read().users.contains_key(user_id)
    }

    pub fn list_online(&self) -> HashSet<UserId> {
        self.read().users.keys().copied().collect()
    }

    pub fn live_connections(&self) -> usize {
        self.read().live.len()
    }

    /// Sends to every live connection, returns how many accepted the event.
    pub fn broadcast(&self, event: T) -> usize {
        let targets: Vec<ConnectionHandle<T>> = self.read().live.values().cloned().collect();
        targets.into_iter().filter(|handle| handle.send(event.clone())).count()
    }

    /// Forgets every session. Connections keep their own handle, so this
    /// closes no socket by itself.
    pub fn close_all(&self) {
        let mut sessions = self.write();
        sessions.live.clear();
        sessions.users.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, Sessions<T>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Sessions<T>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
