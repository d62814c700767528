use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{Mutex, mpsc};

use crate::api::events::{ClientMessage, ServerMessage};
use crate::db::repo;
use crate::matchmaking::matcher::{MatchStats, Matcher, SessionStart};
use crate::matchmaking::registry::ClientId;

/// Owns the matching core behind a single lock, which serializes every
/// state-mutating event against the queue and directory. Notification
/// delivery and persistence both happen strictly after the lock is
/// released.
#[derive(Clone)]
pub struct Matchmaker {
    inner: Arc<Mutex<Matcher>>,
    db: SqlitePool,
}

impl Matchmaker {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Matcher::new())),
            db,
        }
    }

    pub async fn connect(
        &self,
        id: ClientId,
        addr: SocketAddr,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        let deliveries = {
            let mut matcher = self.inner.lock().await;
            let out = matcher.connect(id, sender);
            matcher.resolve(out)
        };
        deliver(deliveries).await;
        tracing::info!(client = %id, %addr, "client connected");

        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) =
                repo::log_user_connection(&db, &id.to_string(), &addr.ip().to_string()).await
            {
                tracing::warn!(error = %e, client = %id, "failed to log user connection");
            }
        });
    }

    /// Routes one parsed client event. Relayable payload kinds go through
    /// the dispatcher, control events through the pairing/lifecycle paths.
    pub async fn handle(&self, id: ClientId, event: ClientMessage) {
        match event {
            ClientMessage::FindChat => self.find_chat(id).await,
            ClientMessage::Next => self.next(id).await,
            ClientMessage::EndChat => self.end_chat(id).await,
            relayable => self.relay(id, relayable).await,
        }
    }

    pub async fn find_chat(&self, id: ClientId) {
        self.match_request(id).await;
    }

    /// Partner switch: the current pairing (if any) is torn down and the
    /// requester immediately re-enters matching.
    pub async fn next(&self, id: ClientId) {
        tracing::info!(client = %id, "next partner requested");
        self.match_request(id).await;
    }

    async fn match_request(&self, id: ClientId) {
        let (deliveries, started) = {
            let mut matcher = self.inner.lock().await;
            let (out, started) = matcher.find_match(id);
            (matcher.resolve(out), started)
        };
        deliver(deliveries).await;
        if let Some(start) = started {
            self.log_session_start(start);
        }
    }

    /// Upstream media failure or an explicit hang-up: teardown without
    /// re-queuing the requester.
    pub async fn end_chat(&self, id: ClientId) {
        let deliveries = {
            let mut matcher = self.inner.lock().await;
            let out = matcher.end_chat(id);
            matcher.resolve(out)
        };
        deliver(deliveries).await;
    }

    pub async fn relay(&self, id: ClientId, event: ClientMessage) {
        let deliveries = {
            let matcher = self.inner.lock().await;
            let out = matcher.relay(id, event);
            matcher.resolve(out)
        };
        deliver(deliveries).await;
    }

    pub async fn disconnect(&self, id: ClientId) {
        let deliveries = {
            let mut matcher = self.inner.lock().await;
            let out = matcher.disconnect(id);
            matcher.resolve(out)
        };
        deliver(deliveries).await;
        tracing::info!(client = %id, "client disconnected");
    }

    pub async fn stats(&self) -> MatchStats {
        self.inner.lock().await.stats()
    }

    // Dispatched only after the pairing has committed; a failure here is
    // logged and swallowed, never unwinding the match.
    fn log_session_start(&self, start: SessionStart) {
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = repo::log_chat_session(
                &db,
                &start.session_id.to_string(),
                &start.user1.to_string(),
                &start.user2.to_string(),
            )
            .await
            {
                tracing::warn!(error = %e, session = %start.session_id, "failed to log chat session");
            }
        });
    }
}

async fn deliver(deliveries: Vec<(mpsc::Sender<ServerMessage>, ServerMessage)>) {
    for (tx, msg) in deliveries {
        // A failed send means the receiver task is gone; the disconnect path
        // cleans the registry up.
        let _ = tx.send(msg).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn matchmaker() -> Matchmaker {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        repo::init_schema(&pool).await.unwrap();
        Matchmaker::new(pool)
    }

    async fn connect(mm: &Matchmaker) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(8);
        mm.connect(id, "127.0.0.1:4000".parse().unwrap(), tx).await;
        (id, rx)
    }

    #[tokio::test]
    async fn test_match_and_message_flow() {
        let mm = matchmaker().await;
        let (a, mut rx_a) = connect(&mm).await;
        let (b, mut rx_b) = connect(&mm).await;
        let (_c, mut rx_c) = connect(&mm).await;

        mm.handle(a, ClientMessage::FindChat).await;
        assert_eq!(rx_a.try_recv().unwrap(), ServerMessage::Waiting);

        mm.handle(b, ClientMessage::FindChat).await;
        let ServerMessage::ChatStarted {
            partner_id,
            chat_session_id,
        } = rx_b.try_recv().unwrap()
        else {
            panic!("expected chatStarted for b");
        };
        assert_eq!(partner_id, a);
        assert_eq!(
            rx_a.try_recv().unwrap(),
            ServerMessage::ChatStarted {
                partner_id: b,
                chat_session_id,
            }
        );

        mm.handle(
            a,
            ClientMessage::SendMessage {
                message: "hey".to_string(),
            },
        )
        .await;
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerMessage::MessageReceived {
                message: "hey".to_string(),
            }
        );
        // bystanders hear nothing
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_signaling_forwarded_verbatim() {
        let mm = matchmaker().await;
        let (a, mut rx_a) = connect(&mm).await;
        let (b, mut rx_b) = connect(&mm).await;
        mm.find_chat(a).await;
        mm.find_chat(b).await;
        rx_a.try_recv().unwrap(); // waiting
        rx_a.try_recv().unwrap(); // chatStarted
        rx_b.try_recv().unwrap(); // chatStarted

        let offer = json!({"sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1", "type": "offer"});
        mm.handle(a, ClientMessage::Offer { offer: offer.clone() }).await;

        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerMessage::Offer { offer, from: a }
        );
    }

    #[tokio::test]
    async fn test_disconnect_notifies_partner() {
        let mm = matchmaker().await;
        let (a, mut rx_a) = connect(&mm).await;
        let (b, mut rx_b) = connect(&mm).await;
        mm.find_chat(a).await;
        mm.find_chat(b).await;
        rx_a.try_recv().unwrap();
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();

        mm.disconnect(a).await;

        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::ChatEnded);
        let stats = mm.stats().await;
        assert_eq!(stats.connected, 1);
        assert_eq!(stats.active_chats, 0);
    }

    #[tokio::test]
    async fn test_next_recycles_requester() {
        let mm = matchmaker().await;
        let (a, mut rx_a) = connect(&mm).await;
        let (b, mut rx_b) = connect(&mm).await;
        mm.find_chat(a).await;
        mm.find_chat(b).await;
        rx_a.try_recv().unwrap();
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();

        mm.handle(a, ClientMessage::Next).await;

        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::ChatEnded);
        assert_eq!(rx_a.try_recv().unwrap(), ServerMessage::Waiting);
        let stats = mm.stats().await;
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.active_chats, 0);
    }
}
