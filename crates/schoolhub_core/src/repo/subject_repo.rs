//! Subject repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist subject batches and serve scope-filtered reads.
//! - Delete subjects while returning the removed records, so callers can
//!   reconcile dependent collections with the exact id set.
//!
//! # Invariants
//! - Batch inserts are all-or-nothing.
//! - A unique-index rejection on `(school_uuid, code)` surfaces as
//!   `RepoError::Conflict`, never as a generic DB error.
//! - Deletes never report counts only.
//! - A delete whose removed rows cannot all be read back is rolled back.

use crate::db::DbError;
use crate::model::subject::{ClassId, SchoolId, Subject, SubjectDraft, SubjectId, TeacherId};
use crate::model::EntityKind;
use crate::repo::{parse_optional_uuid, parse_uuid, require_schema, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const SUBJECT_COLUMNS: &str =
    "uuid, name, code, sessions, class_uuid, school_uuid, teacher_uuid, created_at, updated_at";

/// Which subjects a list or bulk delete targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectScope {
    School(SchoolId),
    Class(ClassId),
}

impl SubjectScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::School(_) => "school",
            Self::Class(_) => "class",
        }
    }

    fn filter(self) -> (&'static str, Uuid) {
        match self {
            Self::School(id) => ("school_uuid", id),
            Self::Class(id) => ("class_uuid", id),
        }
    }
}

/// Query options for listing subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectListQuery {
    pub scope: SubjectScope,
    /// Only subjects without an assigned teacher.
    pub unassigned_only: bool,
}

impl SubjectListQuery {
    pub fn all_in(scope: SubjectScope) -> Self {
        Self {
            scope,
            unassigned_only: false,
        }
    }

    pub fn unassigned_in(scope: SubjectScope) -> Self {
        Self {
            scope,
            unassigned_only: true,
        }
    }
}

/// Repository interface for subject documents.
pub trait SubjectRepository {
    /// Inserts pre-validated drafts and returns them in input order.
    fn insert_batch(
        &self,
        class_id: ClassId,
        school_id: SchoolId,
        drafts: &[SubjectDraft],
    ) -> RepoResult<Vec<Subject>>;
    fn get_subject(&self, id: SubjectId) -> RepoResult<Option<Subject>>;
    fn list_subjects(&self, query: &SubjectListQuery) -> RepoResult<Vec<Subject>>;
    /// Removes one subject and returns it, or `None` when it did not exist.
    fn delete_subject(&self, id: SubjectId) -> RepoResult<Option<Subject>>;
    /// Removes every subject in scope and returns the removed records.
    fn delete_subjects(&self, scope: SubjectScope) -> RepoResult<Vec<Subject>>;
    /// Points the subject at `teacher_id`, releasing any other subject the
    /// teacher held.
    fn set_teacher(&self, id: SubjectId, teacher_id: TeacherId) -> RepoResult<()>;
}

/// SQLite-backed subject repository.
pub struct SqliteSubjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSubjectRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        require_schema(conn, &["subjects", "classes", "schools"])?;
        Ok(Self { conn })
    }
}

impl SubjectRepository for SqliteSubjectRepository<'_> {
    fn insert_batch(
        &self,
        class_id: ClassId,
        school_id: SchoolId,
        drafts: &[SubjectDraft],
    ) -> RepoResult<Vec<Subject>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut created = Vec::with_capacity(drafts.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO subjects (
                    uuid,
                    name,
                    code,
                    sessions,
                    class_uuid,
                    school_uuid
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                RETURNING created_at, updated_at;",
            )?;

            for draft in drafts {
                let id = Uuid::new_v4();
                let (created_at, updated_at) = stmt
                    .query_row(
                        params![
                            id.to_string(),
                            draft.name.as_str(),
                            draft.code.as_str(),
                            draft.sessions.as_str(),
                            class_id.to_string(),
                            school_id.to_string(),
                        ],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                    )
                    .map_err(|err| map_insert_error(err, draft, school_id))?;

                created.push(Subject {
                    id,
                    name: draft.name.clone(),
                    code: draft.code.clone(),
                    sessions: draft.sessions.clone(),
                    class_id,
                    school_id: Some(school_id),
                    teacher_id: None,
                    created_at,
                    updated_at,
                });
            }
        }
        tx.commit()?;

        Ok(created)
    }

    fn get_subject(&self, id: SubjectId) -> RepoResult<Option<Subject>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE uuid = ?1;"),
                [id.to_string()],
                read_raw_subject,
            )
            .optional()?;

        row.map(RawSubject::into_subject).transpose()
    }

    fn list_subjects(&self, query: &SubjectListQuery) -> RepoResult<Vec<Subject>> {
        let (column, scope_id) = query.scope.filter();
        let mut sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE {column} = ?1");
        if query.unassigned_only {
            sql.push_str(" AND teacher_uuid IS NULL");
        }
        sql.push_str(" ORDER BY created_at ASC, rowid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([scope_id.to_string()])?;
        let mut subjects = Vec::new();
        while let Some(row) = rows.next()? {
            subjects.push(read_raw_subject(row)?.into_subject()?);
        }

        Ok(subjects)
    }

    fn delete_subject(&self, id: SubjectId) -> RepoResult<Option<Subject>> {
        let mut removed = delete_returning(
            self.conn,
            &format!("DELETE FROM subjects WHERE uuid = ?1 RETURNING {SUBJECT_COLUMNS};"),
            id,
        )?;
        Ok(removed.pop())
    }

    fn delete_subjects(&self, scope: SubjectScope) -> RepoResult<Vec<Subject>> {
        let (column, scope_id) = scope.filter();
        delete_returning(
            self.conn,
            &format!("DELETE FROM subjects WHERE {column} = ?1 RETURNING {SUBJECT_COLUMNS};"),
            scope_id,
        )
    }

    fn set_teacher(&self, id: SubjectId, teacher_id: TeacherId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE subjects
             SET teacher_uuid = NULL,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE teacher_uuid = ?2
               AND uuid <> ?1;",
            params![id.to_string(), teacher_id.to_string()],
        )?;
        let changed = tx.execute(
            "UPDATE subjects
             SET teacher_uuid = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), teacher_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Subject, id));
        }
        tx.commit()?;

        Ok(())
    }
}

/// Runs a `DELETE ... RETURNING` and converts every removed row.
///
/// A row that fails conversion rolls the whole delete back, so the caller
/// never loses subjects it cannot name.
fn delete_returning(conn: &Connection, sql: &str, key: Uuid) -> RepoResult<Vec<Subject>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let raw = {
        let mut stmt = tx.prepare(sql)?;
        let mut rows = stmt.query([key.to_string()])?;
        let mut raw = Vec::new();
        while let Some(row) = rows.next()? {
            raw.push(read_raw_subject(row)?);
        }
        raw
    };

    // Dropping `tx` on the error path rolls the delete back.
    let mut removed = raw
        .into_iter()
        .map(RawSubject::into_subject)
        .collect::<RepoResult<Vec<_>>>()?;
    tx.commit()?;

    // RETURNING order is unspecified.
    removed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(removed)
}

fn map_insert_error(err: rusqlite::Error, draft: &SubjectDraft, school_id: SchoolId) -> RepoError {
    let err = DbError::from(err);
    if err.is_unique_violation() {
        return RepoError::Conflict(format!(
            "subject code `{}` already exists in school {school_id} ({err})",
            draft.code
        ));
    }
    RepoError::Db(err)
}

/// Row values before uuid parsing, so row mapping stays infallible beyond
/// SQLite type errors.
struct RawSubject {
    uuid: String,
    name: String,
    code: String,
    sessions: String,
    class_uuid: String,
    school_uuid: Option<String>,
    teacher_uuid: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl RawSubject {
    fn into_subject(self) -> RepoResult<Subject> {
        Ok(Subject {
            id: parse_uuid(&self.uuid, "subjects.uuid")?,
            name: self.name,
            code: self.code,
            sessions: self.sessions,
            class_id: parse_uuid(&self.class_uuid, "subjects.class_uuid")?,
            school_id: parse_optional_uuid(self.school_uuid, "subjects.school_uuid")?,
            teacher_id: parse_optional_uuid(self.teacher_uuid, "subjects.teacher_uuid")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn read_raw_subject(row: &Row<'_>) -> rusqlite::Result<RawSubject> {
    Ok(RawSubject {
        uuid: row.get("uuid")?,
        name: row.get("name")?,
        code: row.get("code")?,
        sessions: row.get("sessions")?,
        class_uuid: row.get("class_uuid")?,
        school_uuid: row.get("school_uuid")?,
        teacher_uuid: row.get("teacher_uuid")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
