use std::path::Path;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::error::ChatResult;

mod schema;
pub(crate) mod repo;

pub mod catalog;
pub mod ledger;
pub mod messages;

pub use catalog::{ModelCatalog, PriceConfig};
pub use ledger::BalanceLedger;
pub use messages::MessageStore;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Handle to the transactional store backing messages, balances and prices.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    /// Open (creating if needed) the SQLite database and bootstrap the schema.
    /// Safe to call on an existing database; the schema is additive.
    pub fn open(path: &Path) -> ChatResult<Store> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let manager = SqliteConnectionManager::file(path)
            .with_flags(flags)
            .with_init(|conn| {
                conn.execute_batch(
                    r#"
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = NORMAL;
                    PRAGMA foreign_keys = ON;
                    PRAGMA busy_timeout = 5000;
                    "#,
                )
            });
        let pool = r2d2::Pool::builder().build(manager)?;
        let store = Store { pool };
        let conn = store.conn()?;
        schema::create_schema(&conn)?;
        Ok(store)
    }

    pub(crate) fn conn(&self) -> ChatResult<PooledConnection> {
        Ok(self.pool.get()?)
    }

    pub fn messages(&self) -> MessageStore {
        MessageStore::new(self.clone())
    }

    pub fn ledger(&self) -> BalanceLedger {
        BalanceLedger::new(self.clone())
    }

    pub fn catalog(&self) -> ModelCatalog {
        ModelCatalog::new(self.clone())
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::Store;

    /// Throwaway on-disk database; WAL + shared access across pool
    /// connections work the same as production.
    pub fn temp_store() -> Store {
        let path = std::env::temp_dir().join(format!("chatrelay-test-{}.db", uuid::Uuid::new_v4()));
        Store::open(&path).expect("open temp store")
    }
}

#[cfg(test)]
mod tests {
    use super::Store;

    #[test]
    fn open_bootstraps_schema_and_reopen_is_safe() {
        let path = std::env::temp_dir().join(format!("chatrelay-test-{}.db", uuid::Uuid::new_v4()));
        let store = Store::open(&path).unwrap();
        let chat = store.messages().create_chat("user-1", None).unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.messages().get_chat(&chat.id).unwrap().id, chat.id);
    }
}
