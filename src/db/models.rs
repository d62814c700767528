use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserConnection {
    pub id: i64,
    pub client_id: String,
    pub ip_address: String,
    pub connection_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatSession {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub start_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub message_content: String,
    pub chat_session_id: Option<String>,
    pub timestamp: i64,
}
