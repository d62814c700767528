use sqlx::SqlitePool;

// Write-only log store. Every caller treats a failure here as
// log-and-continue; nothing in the matching path reads these tables back.

pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_connections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id TEXT NOT NULL,
            ip_address TEXT NOT NULL,
            connection_time INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id TEXT PRIMARY KEY,
            user1_id TEXT NOT NULL,
            user2_id TEXT NOT NULL,
            start_time INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            message_content TEXT NOT NULL,
            chat_session_id TEXT,
            timestamp INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn log_user_connection(
    pool: &SqlitePool,
    client_id: &str,
    ip_address: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO user_connections (client_id, ip_address) VALUES (?, ?)")
        .bind(client_id)
        .bind(ip_address)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn log_chat_session(
    pool: &SqlitePool,
    session_id: &str,
    user1_id: &str,
    user2_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO chat_sessions (id, user1_id, user2_id) VALUES (?, ?, ?)")
        .bind(session_id)
        .bind(user1_id)
        .bind(user2_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn log_chat_message(
    pool: &SqlitePool,
    sender_id: &str,
    receiver_id: &str,
    message: &str,
    chat_session_id: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO chat_messages (sender_id, receiver_id, message_content, chat_session_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(sender_id)
    .bind(receiver_id)
    .bind(message)
    .bind(chat_session_id)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}
