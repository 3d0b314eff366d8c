use std::collections::HashSet;

use rusqlite::{params, Row, TransactionBehavior};
use tracing::debug;

use super::repo::{exec, now_millis, query_all, query_one};
use super::Store;
use crate::error::{ChatError, ChatResult};
use crate::money::Money;
use crate::types::{Chat, Cost, Message, MessageStatus, Role, TokenUsage};

/// Truncation limit for titles derived from the first user message.
const TITLE_MAX_CHARS: usize = 50;

/// Persisted conversation trees: an arena of messages keyed by id, each row
/// holding its parent id. Paths and children are reconstructed via index
/// lookups, so branch creation is a pure insert.
#[derive(Clone)]
pub struct MessageStore {
    store: Store,
}

impl MessageStore {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn create_chat(&self, user_id: &str, model_id: Option<&str>) -> ChatResult<Chat> {
        let now = now_millis();
        let chat = Chat {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: String::new(),
            current_model_id: model_id.map(str::to_string),
            config: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        };
        let conn = self.store.conn()?;
        exec(
            &conn,
            "INSERT INTO chats (id, user_id, title, current_model_id, config_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            &[
                &chat.id,
                &chat.user_id,
                &chat.title,
                &chat.current_model_id,
                &chat.config.to_string(),
                &chat.created_at,
                &chat.updated_at,
            ],
        )?;
        Ok(chat)
    }

    pub fn get_chat(&self, chat_id: &str) -> ChatResult<Chat> {
        let conn = self.store.conn()?;
        query_one(
            &conn,
            "SELECT id, user_id, title, current_model_id, config_json, created_at, updated_at
             FROM chats WHERE id = ?1",
            &[&chat_id],
            row_to_chat,
        )?
        .ok_or_else(|| ChatError::NotFound(format!("chat {}", chat_id)))
    }

    /// Register a new node under `message.parent_id`. The parent must exist
    /// and belong to the same chat; siblings become alternate branches.
    pub fn append_message(&self, message: &Message) -> ChatResult<()> {
        let conn = self.store.conn()?;
        // Chat must exist before any node can attach to it.
        query_one(&conn, "SELECT id FROM chats WHERE id = ?1", &[&message.chat_id], |row| {
            row.get::<_, String>(0)
        })?
        .ok_or_else(|| ChatError::NotFound(format!("chat {}", message.chat_id)))?;

        if let Some(parent_id) = &message.parent_id {
            let parent_chat = query_one(
                &conn,
                "SELECT chat_id FROM messages WHERE id = ?1",
                &[parent_id],
                |row| row.get::<_, String>(0),
            )?;
            match parent_chat {
                Some(chat_id) if chat_id == message.chat_id => {}
                Some(_) => {
                    return Err(ChatError::Conflict(format!(
                        "parent {} belongs to a different chat",
                        parent_id
                    )))
                }
                None => {
                    return Err(ChatError::Conflict(format!(
                        "parent {} does not exist",
                        parent_id
                    )))
                }
            }
        }

        let attachments_json = if message.attachments.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&message.attachments).map_err(|e| {
                ChatError::Storage(format!("encoding attachments: {}", e))
            })?)
        };
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO messages
             (id, chat_id, parent_id, role, text, attachments_json, status,
              input_tokens, output_tokens, input_price, output_price, model_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                message.id,
                message.chat_id,
                message.parent_id,
                message.role.as_str(),
                message.text,
                attachments_json,
                status_str(message.status),
                message.token_usage.map(|u| u.input_tokens as i64),
                message.token_usage.map(|u| u.output_tokens as i64),
                message.cost.map(|c| c.input_price.micros()),
                message.cost.map(|c| c.output_price.micros()),
                message.model_id,
                message.created_at,
            ],
        )?;
        if inserted == 0 {
            return Err(ChatError::Conflict(format!(
                "message id {} already exists",
                message.id
            )));
        }
        Ok(())
    }

    pub fn get_message(&self, id: &str) -> ChatResult<Message> {
        let conn = self.store.conn()?;
        query_one(&conn, &select_message("WHERE id = ?1"), &[&id], row_to_message)?
            .ok_or_else(|| ChatError::NotFound(format!("message {}", id)))
    }

    /// Root-first sequence from the chat root down to `message_id`, the
    /// generation context for a branch. `None` means a new root branch and
    /// yields an empty path.
    pub fn get_ancestor_path(
        &self,
        chat_id: &str,
        message_id: Option<&str>,
    ) -> ChatResult<Vec<Message>> {
        let Some(leaf_id) = message_id else {
            return Ok(Vec::new());
        };
        let conn = self.store.conn()?;
        let mut path = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor = Some(leaf_id.to_string());
        while let Some(id) = cursor {
            if !seen.insert(id.clone()) {
                return Err(ChatError::Storage(format!(
                    "parent cycle detected at message {}",
                    id
                )));
            }
            let message =
                query_one(&conn, &select_message("WHERE id = ?1"), &[&id], row_to_message)?
                    .ok_or_else(|| ChatError::NotFound(format!("message {}", id)))?;
            if message.chat_id != chat_id {
                return Err(ChatError::NotFound(format!(
                    "message {} not in chat {}",
                    id, chat_id
                )));
            }
            cursor = message.parent_id.clone();
            path.push(message);
        }
        path.reverse();
        Ok(path)
    }

    /// Children of a parent in creation order, for branch navigation.
    /// `None` lists root-level branches.
    pub fn list_siblings(
        &self,
        chat_id: &str,
        parent_id: Option<&str>,
    ) -> ChatResult<Vec<Message>> {
        let conn = self.store.conn()?;
        match parent_id {
            Some(parent) => query_all(
                &conn,
                &select_message("WHERE chat_id = ?1 AND parent_id = ?2 ORDER BY created_at, rowid"),
                &[&chat_id, &parent],
                row_to_message,
            ),
            None => query_all(
                &conn,
                &select_message("WHERE chat_id = ?1 AND parent_id IS NULL ORDER BY created_at, rowid"),
                &[&chat_id],
                row_to_message,
            ),
        }
    }

    /// Commit a completed (or partially completed) generation. Idempotent:
    /// repeating the call with an identical payload is a no-op, a different
    /// payload on an already-final message is a conflict, which is what
    /// prevents double-accounting from duplicate stream completions.
    pub fn finalize_message(
        &self,
        id: &str,
        text: &str,
        usage: TokenUsage,
        cost: Cost,
    ) -> ChatResult<()> {
        let mut conn = self.store.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = query_one(
            &tx,
            "SELECT status, text, input_tokens, output_tokens, input_price, output_price
             FROM messages WHERE id = ?1",
            &[&id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                ))
            },
        )?
        .ok_or_else(|| ChatError::NotFound(format!("message {}", id)))?;

        let (status, prev_text, in_tok, out_tok, in_price, out_price) = existing;
        if status == "final" {
            let same = prev_text == text
                && in_tok == Some(usage.input_tokens as i64)
                && out_tok == Some(usage.output_tokens as i64)
                && in_price == Some(cost.input_price.micros())
                && out_price == Some(cost.output_price.micros());
            return if same {
                debug!(message_id = id, "finalize replay with identical payload, no-op");
                Ok(())
            } else {
                Err(ChatError::Conflict(format!(
                    "message {} already finalized with a different payload",
                    id
                )))
            };
        }

        exec(
            &tx,
            "UPDATE messages SET text = ?2, status = 'final',
             input_tokens = ?3, output_tokens = ?4, input_price = ?5, output_price = ?6
             WHERE id = ?1",
            &[
                &id,
                &text,
                &(usage.input_tokens as i64),
                &(usage.output_tokens as i64),
                &cost.input_price.micros(),
                &cost.output_price.micros(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drop a pending node that never produced output (pre-stream failure).
    /// Quietly ignores nodes that were finalized in the meantime.
    pub fn discard_pending(&self, id: &str) -> ChatResult<()> {
        let conn = self.store.conn()?;
        exec(
            &conn,
            "DELETE FROM messages WHERE id = ?1 AND status = 'pending'
             AND NOT EXISTS (SELECT 1 FROM messages c WHERE c.parent_id = ?1)",
            &[&id],
        )?;
        Ok(())
    }

    /// Delete a message and its entire subtree. Cascade is the chosen policy:
    /// reparenting would silently rewrite ancestor paths of surviving
    /// branches. Refused while any node of the subtree is still pending.
    pub fn delete_message(&self, id: &str, requester_user_id: &str) -> ChatResult<()> {
        let mut conn = self.store.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let chat_id = query_one(
            &tx,
            "SELECT chat_id FROM messages WHERE id = ?1",
            &[&id],
            |row| row.get::<_, String>(0),
        )?
        .ok_or_else(|| ChatError::NotFound(format!("message {}", id)))?;

        let owner = query_one(
            &tx,
            "SELECT user_id FROM chats WHERE id = ?1",
            &[&chat_id],
            |row| row.get::<_, String>(0),
        )?
        .ok_or_else(|| ChatError::NotFound(format!("chat {}", chat_id)))?;
        if owner != requester_user_id {
            return Err(ChatError::Unauthorized(format!(
                "user {} does not own chat {}",
                requester_user_id, chat_id
            )));
        }

        // Deepest-first so single-row deletes never orphan a child.
        let subtree = query_all(
            &tx,
            "WITH RECURSIVE subtree(id, status, depth) AS (
                 SELECT id, status, 0 FROM messages WHERE id = ?1
                 UNION ALL
                 SELECT m.id, m.status, s.depth + 1
                 FROM messages m JOIN subtree s ON m.parent_id = s.id
             )
             SELECT id, status FROM subtree ORDER BY depth DESC",
            &[&id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;
        if subtree.iter().any(|(_, status)| status == "pending") {
            return Err(ChatError::Conflict(format!(
                "message {} has in-flight generation in its subtree",
                id
            )));
        }
        for (node_id, _) in &subtree {
            exec(&tx, "DELETE FROM messages WHERE id = ?1", &[node_id])?;
        }
        tx.commit()?;
        debug!(message_id = id, removed = subtree.len(), "deleted message subtree");
        Ok(())
    }

    /// Refresh chat metadata after a new leaf message: current model,
    /// `updated_at`, and, on the first message of a chat, the derived title.
    pub fn touch_chat(
        &self,
        chat_id: &str,
        model_id: &str,
        title_source: Option<&str>,
    ) -> ChatResult<()> {
        let conn = self.store.conn()?;
        exec(
            &conn,
            "UPDATE chats SET current_model_id = ?2, updated_at = ?3 WHERE id = ?1",
            &[&chat_id, &model_id, &now_millis()],
        )?;
        if let Some(source) = title_source {
            let title = derive_title(source);
            if !title.is_empty() {
                exec(
                    &conn,
                    "UPDATE chats SET title = ?2 WHERE id = ?1 AND title = ''",
                    &[&chat_id, &title],
                )?;
            }
        }
        Ok(())
    }
}

fn derive_title(text: &str) -> String {
    text.trim().chars().take(TITLE_MAX_CHARS).collect()
}

fn status_str(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Pending => "pending",
        MessageStatus::Final => "final",
    }
}

fn select_message(suffix: &str) -> String {
    format!(
        "SELECT id, chat_id, parent_id, role, text, attachments_json, status,
         input_tokens, output_tokens, input_price, output_price, model_id, created_at
         FROM messages {}",
        suffix
    )
}

fn row_to_chat(row: &Row<'_>) -> Result<Chat, rusqlite::Error> {
    let config_json: Option<String> = row.get(4)?;
    Ok(Chat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        current_model_id: row.get(3)?,
        config: config_json
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(serde_json::Value::Null),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_message(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    let role_raw: String = row.get(3)?;
    let attachments_json: Option<String> = row.get(5)?;
    let status_raw: String = row.get(6)?;
    let input_tokens: Option<i64> = row.get(7)?;
    let output_tokens: Option<i64> = row.get(8)?;
    let input_price: Option<i64> = row.get(9)?;
    let output_price: Option<i64> = row.get(10)?;
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        parent_id: row.get(2)?,
        role: Role::parse(&role_raw).unwrap_or(Role::User),
        text: row.get(4)?,
        attachments: attachments_json
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default(),
        status: if status_raw == "pending" {
            MessageStatus::Pending
        } else {
            MessageStatus::Final
        },
        token_usage: match (input_tokens, output_tokens) {
            (Some(i), Some(o)) => Some(TokenUsage {
                input_tokens: i as u64,
                output_tokens: o as u64,
            }),
            _ => None,
        },
        cost: match (input_price, output_price) {
            (Some(i), Some(o)) => Some(Cost {
                input_price: Money::from_micros(i),
                output_price: Money::from_micros(o),
            }),
            _ => None,
        },
        model_id: row.get(11)?,
        created_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_util::temp_store;

    fn node(
        chat_id: &str,
        id: &str,
        parent: Option<&str>,
        role: Role,
        text: &str,
        created_at: i64,
    ) -> Message {
        Message {
            id: id.to_string(),
            chat_id: chat_id.to_string(),
            parent_id: parent.map(str::to_string),
            role,
            text: text.to_string(),
            attachments: Vec::new(),
            status: MessageStatus::Final,
            token_usage: None,
            cost: None,
            model_id: None,
            created_at,
        }
    }

    fn seed_chain(store: &MessageStore) -> String {
        let chat = store.create_chat("alice", Some("gpt-4o")).unwrap();
        store
            .append_message(&node(&chat.id, "u1", None, Role::User, "hello", 1))
            .unwrap();
        store
            .append_message(&node(&chat.id, "a1", Some("u1"), Role::Assistant, "hi!", 2))
            .unwrap();
        store
            .append_message(&node(&chat.id, "u2", Some("a1"), Role::User, "more", 3))
            .unwrap();
        store
            .append_message(&node(&chat.id, "a2", Some("u2"), Role::Assistant, "sure", 4))
            .unwrap();
        chat.id
    }

    #[test]
    fn ancestor_path_is_contiguous_and_root_terminated() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);

        let path = store.get_ancestor_path(&chat_id, Some("a2")).unwrap();
        assert_eq!(
            path.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["u1", "a1", "u2", "a2"]
        );
        assert!(path[0].parent_id.is_none());
        for pair in path.windows(2) {
            assert_eq!(pair[1].parent_id.as_deref(), Some(pair[0].id.as_str()));
        }
        assert_eq!(path.last().unwrap().id, "a2");
    }

    #[test]
    fn null_message_id_means_new_root_branch() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);
        assert!(store.get_ancestor_path(&chat_id, None).unwrap().is_empty());
    }

    #[test]
    fn path_rejects_foreign_chat() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);
        let other = store.create_chat("alice", None).unwrap();
        assert!(matches!(
            store.get_ancestor_path(&other.id, Some("a2")),
            Err(ChatError::NotFound(_))
        ));
        assert!(matches!(
            store.get_ancestor_path(&chat_id, Some("nope")),
            Err(ChatError::NotFound(_))
        ));
    }

    #[test]
    fn append_rejects_foreign_or_missing_parent() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);
        let other = store.create_chat("alice", None).unwrap();

        let mut stray = node(&other.id, "x1", Some("u1"), Role::User, "hi", 9);
        assert!(matches!(
            store.append_message(&stray),
            Err(ChatError::Conflict(_))
        ));

        stray.chat_id = chat_id.clone();
        stray.parent_id = Some("ghost".into());
        assert!(matches!(
            store.append_message(&stray),
            Err(ChatError::Conflict(_))
        ));
    }

    #[test]
    fn finalize_is_idempotent_and_conflicts_on_divergence() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);
        let mut pending = node(&chat_id, "a3", Some("u2"), Role::Assistant, "", 5);
        pending.status = MessageStatus::Pending;
        store.append_message(&pending).unwrap();

        let usage = TokenUsage {
            input_tokens: 12,
            output_tokens: 7,
        };
        let cost = Cost {
            input_price: Money::parse("0.001").unwrap(),
            output_price: Money::parse("0.002").unwrap(),
        };
        store.finalize_message("a3", "answer", usage, cost).unwrap();
        // Duplicate completion with the same payload: no-op.
        store.finalize_message("a3", "answer", usage, cost).unwrap();
        // Diverging payload: conflict, never silently re-accounted.
        assert!(matches!(
            store.finalize_message("a3", "different", usage, cost),
            Err(ChatError::Conflict(_))
        ));
        let loaded = store.get_message("a3").unwrap();
        assert_eq!(loaded.status, MessageStatus::Final);
        assert_eq!(loaded.text, "answer");
        assert_eq!(loaded.token_usage, Some(usage));
        assert_eq!(loaded.cost, Some(cost));
    }

    #[test]
    fn regenerate_adds_sibling_without_touching_existing_ones() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);
        // u2 already has child a2; add two regenerations.
        store
            .append_message(&node(&chat_id, "a2b", Some("u2"), Role::Assistant, "v2", 5))
            .unwrap();
        store
            .append_message(&node(&chat_id, "a2c", Some("u2"), Role::Assistant, "v3", 6))
            .unwrap();

        let siblings = store.list_siblings(&chat_id, Some("u2")).unwrap();
        assert_eq!(
            siblings.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["a2", "a2b", "a2c"]
        );
        assert_eq!(siblings[0].text, "sure");
        assert_eq!(siblings[1].text, "v2");
    }

    #[test]
    fn delete_cascades_and_enforces_ownership() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);

        assert!(matches!(
            store.delete_message("a1", "mallory"),
            Err(ChatError::Unauthorized(_))
        ));

        store.delete_message("a1", "alice").unwrap();
        assert!(store.get_message("a1").is_err());
        assert!(store.get_message("u2").is_err());
        assert!(store.get_message("a2").is_err());
        // The root survives.
        assert!(store.get_message("u1").is_ok());
    }

    #[test]
    fn delete_refuses_in_flight_subtree() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);
        let mut pending = node(&chat_id, "p1", Some("a2"), Role::Assistant, "", 7);
        pending.status = MessageStatus::Pending;
        store.append_message(&pending).unwrap();

        assert!(matches!(
            store.delete_message("u2", "alice"),
            Err(ChatError::Conflict(_))
        ));
    }

    #[test]
    fn title_derived_once_from_first_user_message() {
        let store = temp_store().messages();
        let chat = store.create_chat("alice", None).unwrap();
        let long = "x".repeat(80);
        store.touch_chat(&chat.id, "gpt-4o", Some(&long)).unwrap();
        let loaded = store.get_chat(&chat.id).unwrap();
        assert_eq!(loaded.title.chars().count(), 50);
        assert_eq!(loaded.current_model_id.as_deref(), Some("gpt-4o"));

        // A later branch must not rewrite the title.
        store.touch_chat(&chat.id, "claude", Some("new title")).unwrap();
        let reloaded = store.get_chat(&chat.id).unwrap();
        assert_eq!(reloaded.title, loaded.title);
        assert_eq!(reloaded.current_model_id.as_deref(), Some("claude"));
    }

    #[test]
    fn discard_pending_only_removes_untouched_pending_nodes() {
        let store = temp_store().messages();
        let chat_id = seed_chain(&store);
        let mut pending = node(&chat_id, "p2", Some("a2"), Role::Assistant, "", 8);
        pending.status = MessageStatus::Pending;
        store.append_message(&pending).unwrap();

        store.discard_pending("p2").unwrap();
        assert!(store.get_message("p2").is_err());
        // Finalized nodes are untouched.
        store.discard_pending("a2").unwrap();
        assert!(store.get_message("a2").is_ok());
    }
}
