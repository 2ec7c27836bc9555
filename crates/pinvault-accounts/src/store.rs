//! Account record storage.
//!
//! The account layer only needs a keyed get/put contract from its store: one
//! envelope string per user name, last writer wins. [`AccountStore`] captures
//! that contract; implementations must provide read-after-write consistency
//! within one execution.
//!
//! Two backends are bundled:
//!
//! - [`MemoryStore`] — process-local map, for tests and embedding.
//! - [`SqliteStore`] — durable SQLite-backed store with automatic schema
//!   migration on open.
//!
//! Envelopes are opaque to this module; nothing here inspects or decrypts
//! them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{AccountError, Result};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Keyed get/put storage for account envelopes.
///
/// Implementations must be `Send + Sync` so one store handle can serve
/// callers across threads. Concurrent writers for the same key are not
/// arbitrated; the contract is last-writer-wins.
pub trait AccountStore: Send + Sync {
    /// Store (or overwrite) the envelope for `key`.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve the envelope for `key`.
    ///
    /// Returns [`AccountError::AccountNotFound`] if the key is absent.
    fn get(&self, key: &str) -> Result<String>;
}

/// Shared handles satisfy the store contract, letting callers keep access to
/// a store they hand to a manager.
impl<S: AccountStore + ?Sized> AccountStore for Arc<S> {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<String> {
        (**self).get(key)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local account store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("memory store mutex poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String> {
        let entries = self.entries.lock().expect("memory store mutex poisoned");
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| AccountError::AccountNotFound {
                user_name: key.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

/// Durable account store backed by SQLite.
///
/// Schema migration is automatic: opening the store creates or upgrades the
/// database as needed.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) an account database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Database`] if the database cannot be opened
    /// or the schema cannot be created.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening account database");

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        Self::run_migrations(&conn)?;

        tracing::info!("account database ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory account database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Configure SQLite pragmas for performance and safety.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    /// Run database schema migrations.
    fn run_migrations(conn: &Connection) -> Result<()> {
        tracing::debug!("running account schema migrations");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                user_name  TEXT PRIMARY KEY,
                envelope   TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;

        tracing::debug!("account schema migrations complete");
        Ok(())
    }
}

impl AccountStore for SqliteStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        let conn = self.conn.lock().expect("account store mutex poisoned");

        conn.execute(
            "INSERT INTO accounts (user_name, envelope, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(user_name) DO UPDATE SET
                 envelope = excluded.envelope,
                 updated_at = excluded.updated_at",
            params![key, value, now],
        )?;

        tracing::debug!(user_name = key, "stored account envelope");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String> {
        let conn = self.conn.lock().expect("account store mutex poisoned");

        let envelope: Option<String> = conn
            .query_row(
                "SELECT envelope FROM accounts WHERE user_name = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        envelope.ok_or_else(|| AccountError::AccountNotFound {
            user_name: key.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(store: &dyn AccountStore) {
        store.put("alice", "envelope-1").unwrap();
        assert_eq!(store.get("alice").unwrap(), "envelope-1");

        // Duplicate saves overwrite.
        store.put("alice", "envelope-2").unwrap();
        assert_eq!(store.get("alice").unwrap(), "envelope-2");

        let result = store.get("bob");
        assert!(matches!(
            result,
            Err(AccountError::AccountNotFound { .. })
        ));
    }

    #[test]
    fn memory_store_roundtrip() {
        roundtrip(&MemoryStore::new());
    }

    #[test]
    fn sqlite_store_roundtrip() {
        roundtrip(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("alice", "envelope-1").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("alice").unwrap(), "envelope-1");
    }

    #[test]
    fn arc_wrapped_store_shares_state() {
        let store = Arc::new(MemoryStore::new());
        let handle: Box<dyn AccountStore> = Box::new(store.clone());

        handle.put("alice", "envelope-1").unwrap();
        assert_eq!(store.get("alice").unwrap(), "envelope-1");
    }
}
