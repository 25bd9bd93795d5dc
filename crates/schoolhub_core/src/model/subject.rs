//! Subject domain model.
//!
//! # Responsibility
//! - Define the canonical subject record and its joined read model.
//! - Validate and normalize batch-create input before persistence.
//!
//! # Invariants
//! - `name`, `code` and `sessions` are non-empty after trim.
//! - `code` is unique within `school_id` (enforced by storage).

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SubjectId = Uuid;
pub type ClassId = Uuid;
pub type SchoolId = Uuid;
pub type TeacherId = Uuid;

/// Canonical subject record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub code: String,
    /// Free-form session count or descriptor.
    pub sessions: String,
    pub class_id: ClassId,
    /// Always set by batch create; optional in storage.
    pub school_id: Option<SchoolId>,
    pub teacher_id: Option<TeacherId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Subject {
    /// Returns whether a teacher is assigned.
    pub fn is_assigned(&self) -> bool {
        self.teacher_id.is_some()
    }
}

/// Subject joined with display names of the records it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectView {
    #[serde(flatten)]
    pub subject: Subject,
    /// `None` when the owning class no longer resolves.
    pub class_name: Option<String>,
    /// `None` when no teacher is assigned.
    pub teacher_name: Option<String>,
}

/// One entry of a batch-create request, as received.
///
/// Missing, `null` and non-scalar fields deserialize to empty strings so
/// validation can name them. Numbers and booleans keep their text form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDraft {
    #[serde(default, alias = "subName", deserialize_with = "loose_text")]
    pub name: String,
    #[serde(default, alias = "subCode", deserialize_with = "loose_text")]
    pub code: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub sessions: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseText {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    Other(IgnoredAny),
}

fn loose_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match LooseText::deserialize(deserializer)? {
        LooseText::Text(text) => text,
        LooseText::Integer(value) => value.to_string(),
        LooseText::Float(value) => value.to_string(),
        LooseText::Flag(value) => value.to_string(),
        LooseText::Other(_) => String::new(),
    };
    Ok(text)
}

impl SubjectDraft {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        sessions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            sessions: sessions.into(),
        }
    }

    fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            code: self.code.trim().to_string(),
            sessions: self.sessions.trim().to_string(),
        }
    }
}

/// Required text fields of a subject draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectField {
    Name,
    Code,
    Sessions,
}

impl SubjectField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Code => "code",
            Self::Sessions => "sessions",
        }
    }
}

/// Batch-create input rejection. Always names the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectValidationError {
    EmptyBatch,
    BlankField { index: usize, field: SubjectField },
}

impl SubjectValidationError {
    /// Path of the offending field, e.g. `subjects[1].code`.
    pub fn field_path(&self) -> String {
        match self {
            Self::EmptyBatch => "subjects".to_string(),
            Self::BlankField { index, field } => format!("subjects[{index}].{}", field.as_str()),
        }
    }
}

impl Display for SubjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBatch => write!(f, "subjects must be a non-empty list"),
            Self::BlankField { .. } => write!(
                f,
                "{} is required and must be a non-empty string",
                self.field_path()
            ),
        }
    }
}

impl Error for SubjectValidationError {}

/// Validates a batch and returns trimmed drafts in input order.
///
/// Stops at the first blank field, checking `name`, `code`, `sessions` in
/// that order for each entry.
pub fn normalize_batch(drafts: &[SubjectDraft]) -> Result<Vec<SubjectDraft>, SubjectValidationError> {
    if drafts.is_empty() {
        return Err(SubjectValidationError::EmptyBatch);
    }

    let mut normalized = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.iter().enumerate() {
        let trimmed = draft.trimmed();
        for (field, value) in [
            (SubjectField::Name, &trimmed.name),
            (SubjectField::Code, &trimmed.code),
            (SubjectField::Sessions, &trimmed.sessions),
        ] {
            if value.is_empty() {
                return Err(SubjectValidationError::BlankField { index, field });
            }
        }
        normalized.push(trimmed);
    }

    Ok(normalized)
}
