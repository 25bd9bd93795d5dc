//! School roster records: schools, classes, teachers and students.
//!
//! These are the dependent collections of the subject cascade. Only the
//! fields the subject workflows read or scrub are modeled.

use crate::model::subject::{ClassId, SchoolId, SubjectId, TeacherId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type StudentId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: SchoolId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: ClassId,
    pub school_id: SchoolId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    pub school_id: SchoolId,
    pub name: String,
    /// At most one subject per teacher.
    pub teach_subject: Option<SubjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub(crate) fn to_db(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub subject_id: SubjectId,
    pub marks_obtained: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub subject_id: SubjectId,
    /// Unix epoch milliseconds.
    pub date: i64,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub school_id: SchoolId,
    pub class_id: ClassId,
    pub name: String,
    /// Insertion order is preserved.
    pub exam_results: Vec<ExamResult>,
    /// Insertion order is preserved.
    pub attendance: Vec<AttendanceEntry>,
}

impl Student {
    /// Returns whether any exam or attendance entry points at `subject_id`.
    pub fn references_subject(&self, subject_id: SubjectId) -> bool {
        self.exam_results
            .iter()
            .any(|entry| entry.subject_id == subject_id)
            || self
                .attendance
                .iter()
                .any(|entry| entry.subject_id == subject_id)
    }
}
