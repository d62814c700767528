use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::events::{ClientMessage, ServerMessage};
use crate::matchmaking::registry::{ClientId, ConnectionRegistry};

/// Token correlating both ends of a pairing and its persisted log rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatSessionId(Uuid);

impl ChatSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ChatSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One half of an active pairing. The directory always holds a mirrored
/// entry for the partner carrying the same session id.
#[derive(Debug, Clone, Copy)]
struct ActiveChat {
    partner: ClientId,
    session_id: ChatSessionId,
}

/// A notification owed to a client once the current transition has committed.
pub type Outbound = (ClientId, ServerMessage);

/// A freshly formed pairing, reported upward so the session-start log can be
/// dispatched after the fact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStart {
    pub session_id: ChatSessionId,
    pub user1: ClientId,
    pub user2: ClientId,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchStats {
    pub connected: usize,
    pub waiting: usize,
    pub active_chats: usize,
}

/// The matching core: connection registry, FIFO waiting queue and symmetric
/// session directory, plus the pairing/lifecycle rules that keep them
/// consistent. Purely synchronous; every method runs to completion under the
/// service lock and returns the notifications to deliver afterwards.
pub struct Matcher {
    registry: ConnectionRegistry,
    waiting: VecDeque<ClientId>,
    chats: HashMap<ClientId, ActiveChat>,
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            waiting: VecDeque::new(),
            chats: HashMap::new(),
        }
    }

    /// Registers a connection. A reused handle replaces the stale registry
    /// entry after its queue/directory membership is purged, so the new
    /// connection starts out idle.
    pub fn connect(&mut self, id: ClientId, sender: mpsc::Sender<ServerMessage>) -> Vec<Outbound> {
        let mut out = Vec::new();
        if self.registry.is_live(&id) {
            tracing::warn!(client = %id, "duplicate connection, replacing stale entry");
            out.extend(self.end_pairing(id));
            self.waiting.retain(|queued| queued != &id);
        }
        self.registry.register(id, sender);
        out
    }

    pub fn is_live(&self, id: &ClientId) -> bool {
        self.registry.is_live(id)
    }

    /// Match request. Any stale pairing of the requester is torn down first,
    /// a duplicate queue entry is impossible, and the oldest live unpaired
    /// waiter wins; otherwise the requester joins the back of the queue.
    pub fn find_match(&mut self, requester: ClientId) -> (Vec<Outbound>, Option<SessionStart>) {
        let mut out = self.end_pairing(requester);
        self.waiting.retain(|queued| queued != &requester);

        if let Some(partner) = self.next_candidate() {
            let session_id = ChatSessionId::new();
            self.chats.insert(requester, ActiveChat { partner, session_id });
            self.chats.insert(
                partner,
                ActiveChat {
                    partner: requester,
                    session_id,
                },
            );
            out.push((
                requester,
                ServerMessage::ChatStarted {
                    partner_id: partner,
                    chat_session_id: session_id,
                },
            ));
            out.push((
                partner,
                ServerMessage::ChatStarted {
                    partner_id: requester,
                    chat_session_id: session_id,
                },
            ));
            tracing::info!(client = %requester, partner = %partner, session = %session_id, "matched");
            (
                out,
                Some(SessionStart {
                    session_id,
                    user1: requester,
                    user2: partner,
                }),
            )
        } else {
            self.waiting.push_back(requester);
            out.push((requester, ServerMessage::Waiting));
            tracing::info!(client = %requester, "waiting for a partner");
            (out, None)
        }
    }

    // First queued handle that is still live and unpaired, in FIFO order.
    // Dead entries are dropped from the queue on sight; paired ones are
    // skipped but left in place.
    fn next_candidate(&mut self) -> Option<ClientId> {
        let mut idx = 0;
        while idx < self.waiting.len() {
            let candidate = self.waiting[idx];
            if !self.registry.is_live(&candidate) {
                tracing::debug!(client = %candidate, "dropping stale queue entry");
                self.waiting.remove(idx);
                continue;
            }
            if self.chats.contains_key(&candidate) {
                idx += 1;
                continue;
            }
            self.waiting.remove(idx);
            return Some(candidate);
        }
        None
    }

    /// Explicit end-of-chat: teardown without re-queuing, leaving the
    /// requester idle until it asks again.
    pub fn end_chat(&mut self, requester: ClientId) -> Vec<Outbound> {
        self.end_pairing(requester)
    }

    /// Disconnect: the handle is purged from every structure and any partner
    /// is told the chat ended.
    pub fn disconnect(&mut self, id: ClientId) -> Vec<Outbound> {
        self.registry.unregister(&id);
        let out = self.end_pairing(id);
        self.waiting.retain(|queued| queued != &id);
        out
    }

    /// Forwards a relayable event to the sender's partner, and nowhere else.
    /// No partner, or a partner that is no longer live, means the payload is
    /// silently dropped.
    pub fn relay(&self, sender: ClientId, event: ClientMessage) -> Vec<Outbound> {
        let Some(chat) = self.chats.get(&sender) else {
            tracing::debug!(client = %sender, "relay with no active partner, dropping");
            return Vec::new();
        };
        if !self.registry.is_live(&chat.partner) {
            tracing::debug!(client = %sender, partner = %chat.partner, "relay to dead partner, dropping");
            return Vec::new();
        }
        match event.into_relay(sender) {
            Some(msg) => vec![(chat.partner, msg)],
            None => Vec::new(),
        }
    }

    // Removes both halves of the requester's pairing, if any, and owes the
    // ex-partner a chatEnded.
    fn end_pairing(&mut self, id: ClientId) -> Vec<Outbound> {
        let mut out = Vec::new();
        if let Some(chat) = self.chats.remove(&id) {
            self.chats.remove(&chat.partner);
            out.push((chat.partner, ServerMessage::ChatEnded));
        }
        out
    }

    pub fn partner_of(&self, id: &ClientId) -> Option<ClientId> {
        self.chats.get(id).map(|chat| chat.partner)
    }

    /// Swaps handles for channel clones so delivery can happen after the
    /// service lock is released. Notifications addressed to handles that are
    /// gone in the meantime are dropped here.
    pub fn resolve(&self, outbound: Vec<Outbound>) -> Vec<(mpsc::Sender<ServerMessage>, ServerMessage)> {
        outbound
            .into_iter()
            .filter_map(|(id, msg)| self.registry.sender(&id).map(|tx| (tx, msg)))
            .collect()
    }

    pub fn stats(&self) -> MatchStats {
        MatchStats {
            connected: self.registry.len(),
            waiting: self.waiting.len(),
            active_chats: self.chats.len() / 2,
        }
    }
}
