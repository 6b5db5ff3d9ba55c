//! Reminder store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the full reminder collection durably across process restarts.
//! - Keep SQL details inside the core persistence boundary.
//! - Reject stale writes from a concurrent poller via `revision`.
//!
//! # Invariants
//! - Write paths call `Reminder::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `save` runs in one immediate transaction; rows only move forward in
//!   `revision`.
//! - Tombstoned rows are never returned by `load` and never resurrected.

use crate::db::{open_db, DbError};
use crate::model::reminder::{
    CustomUnit, Reminder, ReminderId, ReminderValidationError, RepeatRule,
};
use chrono::DateTime;
use log::{debug, info};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use uuid::Uuid;

const REMINDER_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    description,
    due_at,
    repeat_kind,
    repeat_interval,
    repeat_unit,
    notified,
    revision,
    is_deleted
FROM reminders";

const REMINDER_UPSERT_SQL: &str = "INSERT INTO reminders (
    uuid,
    name,
    description,
    due_at,
    repeat_kind,
    repeat_interval,
    repeat_unit,
    notified,
    revision,
    is_deleted
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
ON CONFLICT(uuid) DO UPDATE SET
    name = excluded.name,
    description = excluded.description,
    due_at = excluded.due_at,
    repeat_kind = excluded.repeat_kind,
    repeat_interval = excluded.repeat_interval,
    repeat_unit = excluded.repeat_unit,
    notified = excluded.notified,
    revision = excluded.revision,
    is_deleted = excluded.is_deleted,
    updated_at = (strftime('%s', 'now') * 1000)
WHERE excluded.revision > reminders.revision;";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for reminder and preference persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(ReminderValidationError),
    Db(DbError),
    NotFound(ReminderId),
    AlreadyExists(ReminderId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "reminder not found: {id}"),
            Self::AlreadyExists(id) => write!(f, "reminder already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "database is missing required table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReminderValidationError> for RepoError {
    fn from(value: ReminderValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Outcome of one `save` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Rows inserted or moved to a newer revision.
    pub applied: usize,
    /// Rows left untouched because the stored revision was the same or newer.
    pub skipped: usize,
}

/// Durable reminder collection shared by every poller.
pub trait ReminderStore {
    /// Loads every active reminder ordered by `due_at`. Empty when nothing is stored.
    fn load(&self) -> RepoResult<Vec<Reminder>>;
    /// Writes the collection in one transaction, keeping newer stored revisions.
    fn save(&mut self, reminders: &[Reminder]) -> RepoResult<SaveSummary>;
    /// Inserts one new reminder; fails when the ID is already taken.
    fn create_reminder(&self, reminder: &Reminder) -> RepoResult<ReminderId>;
    /// Gets one reminder by ID with optional tombstone visibility.
    fn get_reminder(&self, id: ReminderId, include_deleted: bool) -> RepoResult<Option<Reminder>>;
    /// Tombstones one reminder and bumps its revision.
    fn soft_delete_reminder(&mut self, id: ReminderId) -> RepoResult<()>;
}

/// SQLite-backed reminder store.
///
/// Owns its connection so a scheduler thread can take the store by value.
pub struct SqliteReminderStore {
    conn: Connection,
}

impl SqliteReminderStore {
    /// Wraps a migrated connection after checking the schema is present.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        for table in ["reminders", "preferences"] {
            if !table_exists(&conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Borrows the underlying connection for sibling repositories.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

}

impl ReminderStore for SqliteReminderStore {
    fn load(&self) -> RepoResult<Vec<Reminder>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REMINDER_SELECT_SQL}
             WHERE is_deleted = 0
             ORDER BY due_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut reminders = Vec::new();
        while let Some(row) = rows.next()? {
            reminders.push(parse_reminder_row(row)?);
        }
        Ok(reminders)
    }

    fn save(&mut self, reminders: &[Reminder]) -> RepoResult<SaveSummary> {
        for reminder in reminders {
            reminder.validate()?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut summary = SaveSummary::default();
        {
            let mut stmt = tx.prepare(REMINDER_UPSERT_SQL)?;
            for reminder in reminders {
                let (kind, interval, unit) = repeat_rule_to_db(&reminder.repeat_rule);
                let changed = stmt.execute(params![
                    reminder.id.to_string(),
                    reminder.name.as_str(),
                    reminder.description.as_deref(),
                    reminder.due_at.timestamp_millis(),
                    kind,
                    interval,
                    unit,
                    bool_to_int(reminder.notified),
                    reminder.revision,
                    bool_to_int(reminder.is_deleted),
                ])?;
                if changed == 0 {
                    summary.skipped += 1;
                } else {
                    summary.applied += 1;
                }
            }
        }
        tx.commit()?;

        debug!(
            "event=reminders_save module=repo status=ok applied={} skipped={}",
            summary.applied, summary.skipped
        );
        Ok(summary)
    }

    fn create_reminder(&self, reminder: &Reminder) -> RepoResult<ReminderId> {
        reminder.validate()?;

        let (kind, interval, unit) = repeat_rule_to_db(&reminder.repeat_rule);
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO reminders (
                uuid,
                name,
                description,
                due_at,
                repeat_kind,
                repeat_interval,
                repeat_unit,
                notified,
                revision,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                reminder.id.to_string(),
                reminder.name.as_str(),
                reminder.description.as_deref(),
                reminder.due_at.timestamp_millis(),
                kind,
                interval,
                unit,
                bool_to_int(reminder.notified),
                reminder.revision,
                bool_to_int(reminder.is_deleted),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::AlreadyExists(reminder.id));
        }

        info!(
            "event=reminder_create module=repo status=ok reminder_id={} repeat={}",
            reminder.id,
            reminder.repeat_rule.kind_str()
        );
        Ok(reminder.id)
    }

    fn get_reminder(&self, id: ReminderId, include_deleted: bool) -> RepoResult<Option<Reminder>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REMINDER_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_reminder_row(row)?));
        }

        Ok(None)
    }

    fn soft_delete_reminder(&mut self, id: ReminderId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE reminders
             SET
                is_deleted = 1,
                revision = revision + 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1 AND is_deleted = 0;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        info!("event=reminder_delete module=repo status=ok reminder_id={id}");
        Ok(())
    }
}

fn parse_reminder_row(row: &Row<'_>) -> RepoResult<Reminder> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in reminders.uuid"))
    })?;

    let due_at_ms: i64 = row.get("due_at")?;
    let due_at = DateTime::from_timestamp_millis(due_at_ms).ok_or_else(|| {
        RepoError::InvalidData(format!("out of range timestamp `{due_at_ms}` in reminders.due_at"))
    })?;

    let repeat_rule = parse_repeat_rule(
        row.get::<_, String>("repeat_kind")?.as_str(),
        row.get("repeat_interval")?,
        row.get("repeat_unit")?,
    )?;

    let reminder = Reminder {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        due_at,
        repeat_rule,
        notified: parse_flag(row.get("notified")?, "notified")?,
        revision: row.get("revision")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "is_deleted")?,
    };
    reminder.validate()?;
    Ok(reminder)
}

fn repeat_rule_to_db(rule: &RepeatRule) -> (&'static str, Option<i64>, Option<&'static str>) {
    match rule {
        RepeatRule::Custom { interval, unit } => {
            ("custom", Some(i64::from(*interval)), Some(unit.as_str()))
        }
        other => (other.kind_str(), None, None),
    }
}

fn parse_repeat_rule(
    kind: &str,
    interval: Option<i64>,
    unit: Option<String>,
) -> RepoResult<RepeatRule> {
    let rule = match kind {
        "none" => RepeatRule::None,
        "hourly" => RepeatRule::Hourly,
        "daily" => RepeatRule::Daily,
        "weekly" => RepeatRule::Weekly,
        "monthly" => RepeatRule::Monthly,
        "yearly" => RepeatRule::Yearly,
        "custom" => {
            let interval = interval
                .and_then(|value| u32::try_from(value).ok())
                .ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "invalid custom interval `{interval:?}` in reminders.repeat_interval"
                    ))
                })?;
            let unit_text = unit.unwrap_or_default();
            let unit = match unit_text.as_str() {
                "seconds" => CustomUnit::Seconds,
                "minutes" => CustomUnit::Minutes,
                "hours" => CustomUnit::Hours,
                "days" => CustomUnit::Days,
                other => {
                    return Err(RepoError::InvalidData(format!(
                        "invalid custom unit `{other}` in reminders.repeat_unit"
                    )));
                }
            };
            RepeatRule::Custom { interval, unit }
        }
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid repeat kind `{other}` in reminders.repeat_kind"
            )));
        }
    };
    Ok(rule)
}

fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in reminders.{column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

impl<S: ReminderStore + ?Sized> ReminderStore for &mut S {
    fn load(&self) -> RepoResult<Vec<Reminder>> {
        (**self).load()
    }

    fn save(&mut self, reminders: &[Reminder]) -> RepoResult<SaveSummary> {
        (**self).save(reminders)
    }

    fn create_reminder(&self, reminder: &Reminder) -> RepoResult<ReminderId> {
        (**self).create_reminder(reminder)
    }

    fn get_reminder(&self, id: ReminderId, include_deleted: bool) -> RepoResult<Option<Reminder>> {
        (**self).get_reminder(id, include_deleted)
    }

    fn soft_delete_reminder(&mut self, id: ReminderId) -> RepoResult<()> {
        (**self).soft_delete_reminder(id)
    }
}
