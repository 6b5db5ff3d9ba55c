//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_reminders.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_preferences.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    latest_of(MIGRATIONS)
}

fn latest_of(migrations: &[Migration]) -> u32 {
    migrations.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// Uses an immediate transaction so a second process opening the same file
/// waits on the busy timeout instead of migrating concurrently.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_set(conn, MIGRATIONS)
}

fn apply_set(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current_version = current_user_version(&tx)?;
    let latest = latest_of(migrations);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    for migration in migrations {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| {
                error!(
                    "event=db_migrate module=db status=error version={} error={}",
                    migration.version, source
                );
                DbError::Migration {
                    version: migration.version,
                    source,
                }
            })?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        current_version, latest
    );
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::{apply_set, current_user_version, Migration};
    use crate::db::DbError;
    use rusqlite::Connection;

    const GOOD: Migration = Migration {
        version: 1,
        sql: "CREATE TABLE first (id INTEGER PRIMARY KEY);",
    };
    const BROKEN: Migration = Migration {
        version: 2,
        sql: "CREATE TABLE second (id INTEGER PRIMARY KEY); INSERT INTO missing VALUES (1);",
    };

    #[test]
    fn failing_migration_reports_its_version_and_rolls_back() {
        let mut conn = Connection::open_in_memory().unwrap();

        let err = apply_set(&mut conn, &[GOOD, BROKEN]).unwrap_err();
        assert!(matches!(err, DbError::Migration { version: 2, .. }));
        assert!(err.to_string().contains("migration 2"));

        assert_eq!(current_user_version(&conn).unwrap(), 0);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn applies_only_pending_migrations() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_set(&mut conn, &[GOOD]).unwrap();
        assert_eq!(current_user_version(&conn).unwrap(), 1);

        let second = Migration {
            version: 2,
            sql: "CREATE TABLE second (id INTEGER PRIMARY KEY);",
        };
        apply_set(&mut conn, &[GOOD, second]).unwrap();
        assert_eq!(current_user_version(&conn).unwrap(), 2);
    }
}
