//! Store contracts consumed by the registry and the cascade.
//!
//! # Responsibility
//! - Declare the per-collection traits (`SubjectRepository`, `TeacherStore`,
//!   `StudentStore`, the directories) and their `Sqlite*` implementations.
//! - Translate SQLite failures into [`RepoError`].
//!
//! # Invariants
//! - A `Sqlite*` store is only built on a connection at the current schema
//!   version with its tables present.
//! - Missing rows surface as `NotFound` and unique violations as `Conflict`,
//!   never as raw SQLite errors.
//! - Id sets of any size are accepted; `IN (...)` lists are bound at most
//!   [`IN_LIST_CHUNK`] ids at a time.
//!
//! # See also
//! - `crate::db` for connection bootstrap.
//! - `crate::service` for the workflows built on these traits.

pub mod directory_repo;
pub mod student_repo;
pub mod subject_repo;
pub mod teacher_repo;

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::EntityKind;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error shared by all repository implementations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Target record does not exist.
    NotFound { entity: EntityKind, id: Uuid },
    /// Uniqueness constraint rejected the write. Carries the store detail.
    Conflict(String),
    /// Connection was not opened through `open_db`/`open_db_in_memory`.
    SchemaNotReady {
        expected_version: u32,
        actual_version: u32,
    },
    MissingTable(&'static str),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(detail) => write!(f, "uniqueness conflict: {detail}"),
            Self::SchemaNotReady {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
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

pub(crate) fn require_schema(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::SchemaNotReady {
            expected_version,
            actual_version,
        });
    }

    let mut lookup =
        conn.prepare_cached("SELECT 1 FROM sqlite_schema WHERE type = 'table' AND name = ?1;")?;
    for &table in tables {
        if !lookup.exists([table])? {
            return Err(RepoError::MissingTable(table));
        }
    }
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(value: Option<String>, column: &str) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

/// Most ids bound into one `IN (...)` list. SQLite rejects statements with
/// more than 32766 variables.
pub(crate) const IN_LIST_CHUNK: usize = 500;

/// Builds `?1, ?2, ...` for an `IN (...)` clause of `count` values.
pub(crate) fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}
