//! Ordered schema steps for the subject store.
//!
//! # Responsibility
//! - `0001_directory`: schools, classes, teachers, students and their
//!   exam/attendance sequences.
//! - `0002_subjects`: the subject table and the per-school code index.
//!
//! # Invariants
//! - Progress is recorded in `PRAGMA user_version`; pending steps apply in
//!   one transaction.
//! - Dependent tables never reference `subjects` by foreign key. The
//!   cascade owns that cleanup.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "directory",
        sql: include_str!("0001_directory.sql"),
    },
    SchemaStep {
        version: 2,
        name: "subjects",
        sql: include_str!("0002_subjects.sql"),
    },
];

/// Highest schema version this build can apply.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.iter().map(|step| step.version).max().unwrap_or(0)
}

/// Reads `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Brings the connection up to [`latest_version`] inside one transaction.
///
/// A database stamped with a newer version than this build knows is
/// refused untouched.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let target = latest_version();
    if from > target {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: target,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        from,
        target,
        pending.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{latest_version, SCHEMA_STEPS};

    #[test]
    fn schema_steps_are_strictly_increasing() {
        let versions: Vec<u32> = SCHEMA_STEPS.iter().map(|step| step.version).collect();
        assert!(versions.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(latest_version(), *versions.last().unwrap());
    }
}
