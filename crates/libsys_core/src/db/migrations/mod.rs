//! Embedded catalog schema migrations.
//!
//! # Responsibility
//! - Keep the ordered list of schema steps compiled into the binary.
//! - Run pending steps in one transaction and stamp `PRAGMA user_version`.
//! - Confirm the catalog tables exist once the version says they should.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - A database newer than [`latest_version`] is never touched.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

/// Tables every repository call relies on.
pub const CATALOG_TABLES: [&str; 3] = ["members", "books", "borrow_records"];

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "init",
    sql: include_str!("0001_init.sql"),
}];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Migrates `conn` to [`latest_version`] and verifies the catalog tables.
///
/// # Errors
/// - [`DbError::UnsupportedSchemaVersion`] when the file is newer than this
///   build.
/// - [`DbError::MissingTable`] when a catalog table is absent afterwards.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = user_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect();
    if !pending.is_empty() {
        let tx = conn.transaction()?;
        for step in &pending {
            tx.execute_batch(step.sql)?;
            tx.pragma_update(None, "user_version", step.version)?;
            info!(
                "event=db_migrate_step module=db status=ok version={} name={}",
                step.version, step.name
            );
        }
        tx.commit()?;
        info!(
            "event=db_migrate module=db status=ok from_version={from_version} to_version={latest}"
        );
    }

    verify_catalog_tables(conn, latest)
}

fn verify_catalog_tables(conn: &Connection, db_version: u32) -> DbResult<()> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
    )?;
    for table in CATALOG_TABLES {
        let present: bool = stmt.query_row([table], |row| row.get(0))?;
        if !present {
            error!(
                "event=db_migrate module=db status=error error_code=missing_table table={table} version={db_version}"
            );
            return Err(DbError::MissingTable { table, db_version });
        }
    }
    Ok(())
}

fn user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?;
    Ok(version)
}
