use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;

use crate::api::server::AppState;
use crate::db::repo;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub chat_session_id: Option<String>,
}

// Side channel for clients that persist their transcript. The relay path
// never touches the database; this endpoint is the only message-log trigger.
pub async fn log_chat_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatMessagePayload>,
) -> impl IntoResponse {
    match repo::log_chat_message(
        &state.db,
        &payload.sender_id,
        &payload.receiver_id,
        &payload.message,
        payload.chat_session_id.as_deref(),
    )
    .await
    {
        Ok(message_id) => (
            StatusCode::OK,
            Json(json!({ "success": true, "messageId": message_id })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to log chat message");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "failed to log message" })),
            )
        }
    }
}
