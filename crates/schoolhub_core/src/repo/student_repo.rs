//! Student store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist each student's ordered exam-result and attendance sequences.
//! - Scrub subject references from those sequences on behalf of the cascade.
//!
//! # Invariants
//! - Sequence order is insertion order (`position ASC`).
//! - Scrub operations report the number of distinct students touched and
//!   are no-ops against already-clean data.

use crate::model::roster::{AttendanceEntry, AttendanceStatus, ExamResult, Student, StudentId};
use crate::model::subject::{ClassId, SchoolId, SubjectId};
use crate::model::EntityKind;
use crate::repo::{
    parse_uuid, placeholders, require_schema, RepoError, RepoResult, IN_LIST_CHUNK,
};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use std::collections::HashSet;
use uuid::Uuid;

/// Student-side operations needed by the subject cascade.
pub trait StudentStore {
    /// Removes exam/attendance entries tagged with `subject_id`.
    fn remove_subject_entries(&self, subject_id: SubjectId) -> RepoResult<usize>;
    /// Removes exam/attendance entries tagged with any of `subject_ids`.
    fn remove_subject_entries_many(&self, subject_ids: &[SubjectId]) -> RepoResult<usize>;
    /// Empties every student's exam and attendance sequences.
    fn reset_all_subject_data(&self) -> RepoResult<usize>;
}

/// SQLite-backed student store.
pub struct SqliteStudentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStudentStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        require_schema(
            conn,
            &["students", "student_exam_results", "student_attendance"],
        )?;
        Ok(Self { conn })
    }

    pub fn create_student(
        &self,
        school_id: SchoolId,
        class_id: ClassId,
        name: &str,
    ) -> RepoResult<Student> {
        let student = Student {
            id: Uuid::new_v4(),
            school_id,
            class_id,
            name: name.trim().to_string(),
            exam_results: Vec::new(),
            attendance: Vec::new(),
        };
        self.conn.execute(
            "INSERT INTO students (uuid, school_uuid, class_uuid, display_name)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                student.id.to_string(),
                school_id.to_string(),
                class_id.to_string(),
                student.name.as_str()
            ],
        )?;
        Ok(student)
    }

    /// Appends an exam result to the student's sequence.
    pub fn record_exam_result(&self, id: StudentId, entry: &ExamResult) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_student_exists(&tx, id)?;
        tx.execute(
            "INSERT INTO student_exam_results (student_uuid, position, subject_uuid, marks_obtained)
             VALUES (
                ?1,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM student_exam_results WHERE student_uuid = ?1),
                ?2,
                ?3
             );",
            params![
                id.to_string(),
                entry.subject_id.to_string(),
                entry.marks_obtained
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Appends an attendance entry to the student's sequence.
    pub fn record_attendance(&self, id: StudentId, entry: &AttendanceEntry) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_student_exists(&tx, id)?;
        tx.execute(
            "INSERT INTO student_attendance (student_uuid, position, subject_uuid, date_epoch_ms, status)
             VALUES (
                ?1,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM student_attendance WHERE student_uuid = ?1),
                ?2,
                ?3,
                ?4
             );",
            params![
                id.to_string(),
                entry.subject_id.to_string(),
                entry.date,
                entry.status.to_db()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_student(&self, id: StudentId) -> RepoResult<Option<Student>> {
        let row = self
            .conn
            .query_row(
                "SELECT school_uuid, class_uuid, display_name FROM students WHERE uuid = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((school_uuid, class_uuid, name)) = row else {
            return Ok(None);
        };

        Ok(Some(Student {
            id,
            school_id: parse_uuid(&school_uuid, "students.school_uuid")?,
            class_id: parse_uuid(&class_uuid, "students.class_uuid")?,
            name,
            exam_results: self.load_exam_results(id)?,
            attendance: self.load_attendance(id)?,
        }))
    }

    fn load_exam_results(&self, id: StudentId) -> RepoResult<Vec<ExamResult>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject_uuid, marks_obtained
             FROM student_exam_results
             WHERE student_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let subject_uuid: String = row.get(0)?;
            entries.push(ExamResult {
                subject_id: parse_uuid(&subject_uuid, "student_exam_results.subject_uuid")?,
                marks_obtained: row.get(1)?,
            });
        }
        Ok(entries)
    }

    fn load_attendance(&self, id: StudentId) -> RepoResult<Vec<AttendanceEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject_uuid, date_epoch_ms, status
             FROM student_attendance
             WHERE student_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let subject_uuid: String = row.get(0)?;
            let status_text: String = row.get(2)?;
            let status = AttendanceStatus::parse(&status_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid attendance status `{status_text}` in student_attendance.status"
                ))
            })?;
            entries.push(AttendanceEntry {
                subject_id: parse_uuid(&subject_uuid, "student_attendance.subject_uuid")?,
                date: row.get(1)?,
                status,
            });
        }
        Ok(entries)
    }
}

impl StudentStore for SqliteStudentStore<'_> {
    fn remove_subject_entries(&self, subject_id: SubjectId) -> RepoResult<usize> {
        self.remove_subject_entries_many(&[subject_id])
    }

    fn remove_subject_entries_many(&self, subject_ids: &[SubjectId]) -> RepoResult<usize> {
        if subject_ids.is_empty() {
            return Ok(0);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        // A student may show up under several chunks; count each once.
        let mut touched: HashSet<String> = HashSet::new();
        for chunk in subject_ids.chunks(IN_LIST_CHUNK) {
            let in_list = placeholders(chunk.len());
            let bind = || params_from_iter(chunk.iter().map(Uuid::to_string));

            {
                let mut stmt = tx.prepare(&format!(
                    "SELECT student_uuid FROM student_exam_results WHERE subject_uuid IN ({in_list})
                     UNION
                     SELECT student_uuid FROM student_attendance WHERE subject_uuid IN ({in_list});"
                ))?;
                let students = stmt.query_map(bind(), |row| row.get::<_, String>(0))?;
                for student in students {
                    touched.insert(student?);
                }
            }
            tx.execute(
                &format!("DELETE FROM student_exam_results WHERE subject_uuid IN ({in_list});"),
                bind(),
            )?;
            tx.execute(
                &format!("DELETE FROM student_attendance WHERE subject_uuid IN ({in_list});"),
                bind(),
            )?;
        }
        tx.commit()?;

        Ok(touched.len())
    }

    fn reset_all_subject_data(&self) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let touched: i64 = tx.query_row(
            "SELECT COUNT(DISTINCT student_uuid) FROM (
                SELECT student_uuid FROM student_exam_results
                UNION ALL
                SELECT student_uuid FROM student_attendance
            );",
            [],
            |row| row.get(0),
        )?;
        tx.execute("DELETE FROM student_exam_results;", [])?;
        tx.execute("DELETE FROM student_attendance;", [])?;
        tx.commit()?;

        Ok(touched as usize)
    }
}

fn ensure_student_exists(conn: &Connection, id: StudentId) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM students WHERE uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(RepoError::not_found(EntityKind::Student, id));
    }
    Ok(())
}
