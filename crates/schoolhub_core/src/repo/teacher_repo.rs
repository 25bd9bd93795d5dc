//! Teacher store contract and SQLite implementation.
//!
//! # Invariants
//! - A teacher holds at most one `teach_subject` reference.
//! - Clearing references is idempotent: re-running against clean rows
//!   updates nothing and returns `0`.

use crate::model::roster::Teacher;
use crate::model::subject::{SchoolId, SubjectId, TeacherId};
use crate::model::EntityKind;
use crate::repo::{
    parse_optional_uuid, parse_uuid, placeholders, require_schema, RepoError, RepoResult,
    IN_LIST_CHUNK,
};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use uuid::Uuid;

/// Teacher-side operations needed by subject workflows.
pub trait TeacherStore {
    /// Unsets `teach_subject` on every teacher pointing at `subject_id`.
    fn clear_subject_reference(&self, subject_id: SubjectId) -> RepoResult<usize>;
    /// Unsets `teach_subject` on every teacher pointing at any of `subject_ids`.
    fn clear_subject_references(&self, subject_ids: &[SubjectId]) -> RepoResult<usize>;
    fn teacher_name(&self, id: TeacherId) -> RepoResult<Option<String>>;
    /// Sets `teach_subject`; `NotFound` when the teacher does not exist.
    fn assign_subject(&self, id: TeacherId, subject_id: SubjectId) -> RepoResult<()>;
}

/// SQLite-backed teacher store.
pub struct SqliteTeacherStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTeacherStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        require_schema(conn, &["teachers"])?;
        Ok(Self { conn })
    }

    pub fn create_teacher(&self, school_id: SchoolId, name: &str) -> RepoResult<Teacher> {
        let teacher = Teacher {
            id: Uuid::new_v4(),
            school_id,
            name: name.trim().to_string(),
            teach_subject: None,
        };
        self.conn.execute(
            "INSERT INTO teachers (uuid, school_uuid, display_name) VALUES (?1, ?2, ?3);",
            params![
                teacher.id.to_string(),
                school_id.to_string(),
                teacher.name.as_str()
            ],
        )?;
        Ok(teacher)
    }

    pub fn get_teacher(&self, id: TeacherId) -> RepoResult<Option<Teacher>> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, school_uuid, display_name, teach_subject
                 FROM teachers
                 WHERE uuid = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((uuid, school_uuid, name, teach_subject)) = row else {
            return Ok(None);
        };
        Ok(Some(Teacher {
            id: parse_uuid(&uuid, "teachers.uuid")?,
            school_id: parse_uuid(&school_uuid, "teachers.school_uuid")?,
            name,
            teach_subject: parse_optional_uuid(teach_subject, "teachers.teach_subject")?,
        }))
    }
}

impl TeacherStore for SqliteTeacherStore<'_> {
    fn clear_subject_reference(&self, subject_id: SubjectId) -> RepoResult<usize> {
        self.clear_subject_references(&[subject_id])
    }

    fn clear_subject_references(&self, subject_ids: &[SubjectId]) -> RepoResult<usize> {
        if subject_ids.is_empty() {
            return Ok(0);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut changed = 0;
        for chunk in subject_ids.chunks(IN_LIST_CHUNK) {
            changed += tx.execute(
                &format!(
                    "UPDATE teachers
                     SET teach_subject = NULL,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE teach_subject IN ({});",
                    placeholders(chunk.len())
                ),
                params_from_iter(chunk.iter().map(Uuid::to_string)),
            )?;
        }
        tx.commit()?;
        Ok(changed)
    }

    fn teacher_name(&self, id: TeacherId) -> RepoResult<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT display_name FROM teachers WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    fn assign_subject(&self, id: TeacherId, subject_id: SubjectId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE teachers
             SET teach_subject = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), subject_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Teacher, id));
        }
        Ok(())
    }
}
