use rusqlite::Connection;

use crate::error::ChatResult;

/// Bootstrap the schema. Additive: every statement is IF NOT EXISTS.
///
/// Monetary columns hold fixed-point integer micro-units (see `money`);
/// sibling order within a branch is `(created_at, rowid)`.
pub fn create_schema(conn: &Connection) -> ChatResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            current_model_id TEXT,
            config_json TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chats_user ON chats(user_id);

        -- Message tree: arena of nodes keyed by id, parent pointer per node.
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL REFERENCES chats(id),
            parent_id TEXT REFERENCES messages(id),
            role TEXT NOT NULL CHECK(role IN ('user','assistant','system')),
            text TEXT NOT NULL DEFAULT '',
            attachments_json TEXT,
            status TEXT NOT NULL CHECK(status IN ('pending','final')),
            input_tokens INTEGER,
            output_tokens INTEGER,
            input_price INTEGER,
            output_price INTEGER,
            model_id TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_chat_parent
            ON messages(chat_id, parent_id, created_at);

        -- One ledger row per user; amount only ever moves via debits.
        CREATE TABLE IF NOT EXISTS balances (
            user_id TEXT PRIMARY KEY,
            amount INTEGER NOT NULL DEFAULT 0
        );

        -- Debit log; the message-id primary key is the idempotency constraint.
        CREATE TABLE IF NOT EXISTS balance_debits (
            message_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_balance_debits_user ON balance_debits(user_id);

        CREATE TABLE IF NOT EXISTS model_prices (
            model_id TEXT PRIMARY KEY,
            input_per_million INTEGER NOT NULL,
            output_per_million INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_models (
            user_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            max_tokens INTEGER,
            temperature_min REAL,
            temperature_max REAL,
            PRIMARY KEY(user_id, model_id)
        );
        "#,
    )?;
    Ok(())
}
