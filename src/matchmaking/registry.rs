use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::events::ServerMessage;

/// Opaque handle for one live connection, issued when the socket is accepted
/// and valid until disconnect. Carries no transport detail; the matching
/// core can be driven without a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Live connections and the outbound channel to each one. Presence in the
/// map is the source of truth for "still connected".
pub struct ConnectionRegistry {
    clients: HashMap<ClientId, mpsc::Sender<ServerMessage>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Returns true if a stale entry for the same handle was replaced.
    pub fn register(&mut self, id: ClientId, sender: mpsc::Sender<ServerMessage>) -> bool {
        self.clients.insert(id, sender).is_some()
    }

    /// Returns whether the handle was present.
    pub fn unregister(&mut self, id: &ClientId) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn is_live(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn sender(&self, id: &ClientId) -> Option<mpsc::Sender<ServerMessage>> {
        self.clients.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> mpsc::Sender<ServerMessage> {
        mpsc::channel(8).0
    }

    #[test]
    fn test_register_and_liveness() {
        let mut registry = ConnectionRegistry::new();
        let id = ClientId::new();

        assert!(!registry.is_live(&id));
        assert!(!registry.register(id, channel()));
        assert!(registry.is_live(&id));
        assert_eq!(registry.len(), 1);
        assert!(registry.sender(&id).is_some());
    }

    #[test]
    fn test_register_replaces_stale_entry() {
        let mut registry = ConnectionRegistry::new();
        let id = ClientId::new();

        registry.register(id, channel());
        assert!(registry.register(id, channel()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_reports_presence() {
        let mut registry = ConnectionRegistry::new();
        let id = ClientId::new();

        registry.register(id, channel());
        assert!(registry.unregister(&id));
        assert!(!registry.unregister(&id));
        assert!(!registry.is_live(&id));
        assert!(registry.sender(&id).is_none());
    }
}
