//! Simple key-value preference map.
//!
//! Holds non-reminder state (time counters, UI choices) as string values.
//! JSON helpers wrap values that are structured on the caller side.

use crate::repo::reminder_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Repository interface for the preference map.
pub trait PreferenceRepository {
    fn get(&self, key: &str) -> RepoResult<Option<String>>;
    /// Inserts or replaces one value.
    fn set(&self, key: &str, value: &str) -> RepoResult<()>;
    /// Removes one key. Returns whether it existed.
    fn remove(&self, key: &str) -> RepoResult<bool>;
    /// Returns every stored key in ascending order.
    fn list_keys(&self) -> RepoResult<Vec<String>>;

    /// Reads and deserializes a JSON value.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> RepoResult<Option<T>> {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|err| {
                RepoError::InvalidData(format!("preference `{key}` is not valid JSON: {err}"))
            }),
            None => Ok(None),
        }
    }

    /// Serializes and stores a JSON value.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> RepoResult<()> {
        let raw = serde_json::to_string(value).map_err(|err| {
            RepoError::InvalidData(format!("preference `{key}` cannot be serialized: {err}"))
        })?;
        self.set(key, &raw)
    }
}

/// SQLite-backed preference map.
pub struct SqlitePreferenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePreferenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PreferenceRepository for SqlitePreferenceRepository<'_> {
    fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let key = normalize_key(key)?;
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        let key = normalize_key(key)?;
        self.conn.execute(
            "INSERT INTO preferences (key, value)
             VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> RepoResult<bool> {
        let key = normalize_key(key)?;
        let changed = self
            .conn
            .execute("DELETE FROM preferences WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn list_keys(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM preferences ORDER BY key ASC;")?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}

fn normalize_key(key: &str) -> RepoResult<&str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(RepoError::InvalidData(
            "preference key must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
