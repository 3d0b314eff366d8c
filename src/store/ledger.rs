use rusqlite::TransactionBehavior;
use tracing::{debug, warn};

use super::repo::{exec, now_millis, query_one};
use super::Store;
use crate::error::{ChatError, ChatResult};
use crate::money::Money;

/// Prepaid balances, one row per user, moved only by message-scoped debits.
///
/// Debits apply as an atomic balance delta inside one transaction, never
/// read-modify-write, and the debit-log primary key on message id makes each
/// message chargeable at most once.
#[derive(Clone)]
pub struct BalanceLedger {
    store: Store,
}

impl BalanceLedger {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn balance(&self, user_id: &str) -> ChatResult<Money> {
        let conn = self.store.conn()?;
        query_one(
            &conn,
            "SELECT amount FROM balances WHERE user_id = ?1",
            &[&user_id],
            |row| row.get::<_, i64>(0),
        )?
        .map(Money::from_micros)
        .ok_or_else(|| ChatError::NotFound(format!("balance for user {}", user_id)))
    }

    /// Admission gate: generation requires a strictly positive balance. This
    /// is a best-effort pre-check; settlement happens at debit time.
    pub fn check_sufficient(&self, user_id: &str) -> ChatResult<bool> {
        let balance = self.balance(user_id)?;
        Ok(balance > Money::ZERO)
    }

    /// Seed or adjust a balance outside the chat flow (admin collaborator).
    pub fn set_balance(&self, user_id: &str, amount: Money) -> ChatResult<()> {
        let conn = self.store.conn()?;
        exec(
            &conn,
            "INSERT INTO balances (user_id, amount) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET amount = excluded.amount",
            &[&user_id, &amount.micros()],
        )?;
        Ok(())
    }

    /// Debit exactly once per message id. A replay with the same amount is a
    /// no-op; a replay with a different amount is a conflict. The balance may
    /// go negative: token cost is unknown until the stream completes, so the
    /// design settles eventually rather than reserving up front.
    pub fn debit(&self, user_id: &str, amount: Money, message_id: &str) -> ChatResult<()> {
        if amount.is_negative() {
            return Err(ChatError::BadRequest(format!(
                "debit amount must not be negative, got {}",
                amount
            )));
        }
        let mut conn = self.store.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO balance_debits (message_id, user_id, amount, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![message_id, user_id, amount.micros(), now_millis()],
        )?;
        if inserted == 0 {
            let prior = query_one(
                &tx,
                "SELECT user_id, amount FROM balance_debits WHERE message_id = ?1",
                &[&message_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )?
            .ok_or_else(|| ChatError::Storage("debit row vanished mid-transaction".into()))?;
            return if prior.0 == user_id && prior.1 == amount.micros() {
                debug!(message_id, "debit replay with identical amount, no-op");
                Ok(())
            } else {
                warn!(message_id, "debit replay with diverging amount");
                Err(ChatError::Conflict(format!(
                    "message {} already debited with a different amount",
                    message_id
                )))
            };
        }

        let updated = tx.execute(
            "UPDATE balances SET amount = amount - ?2 WHERE user_id = ?1",
            rusqlite::params![user_id, amount.micros()],
        )?;
        if updated == 0 {
            return Err(ChatError::NotFound(format!("balance for user {}", user_id)));
        }
        tx.commit()?;
        debug!(user_id, message_id, amount = %amount, "debit applied");
        Ok(())
    }
}
