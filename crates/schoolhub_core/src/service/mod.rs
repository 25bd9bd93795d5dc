//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Translate repository failures into the four caller-facing error kinds.
//!
//! # Invariants
//! - Validation errors are raised before any store mutation.
//! - A cascade failure after the parent delete is reported with the removed
//!   id set and is never rolled back.

pub mod reference_maintainer;
pub mod subject_registry;

use crate::model::subject::{SubjectId, SubjectValidationError};
use crate::model::EntityKind;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Caller-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Conflict,
    Internal,
}

/// Dependent-collection step of the delete cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    ClearTeacherReferences,
    ScrubStudentEntries,
}

impl CascadeStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClearTeacherReferences => "clear_teacher_references",
            Self::ScrubStudentEntries => "scrub_student_entries",
        }
    }
}

/// Errors from subject registry and cascade operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Batch input rejected before any lookup or write.
    InvalidInput(SubjectValidationError),
    /// Referenced record does not exist.
    NotFound { entity: EntityKind, id: Uuid },
    /// Subject code already used within the school.
    Conflict(String),
    /// Subjects were removed but a dependent-collection step failed.
    ///
    /// `subject_ids` is the full removed set; pass it to
    /// `ReferenceMaintainer::rescrub` to repair.
    CascadeIncomplete {
        step: CascadeStep,
        subject_ids: Vec<SubjectId>,
        source: RepoError,
    },
    /// Unexpected store failure.
    Repo(RepoError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::CascadeIncomplete { .. } | Self::Repo(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(_) => write!(f, "duplicate subject code detected"),
            Self::CascadeIncomplete {
                step, subject_ids, ..
            } => write!(
                f,
                "removed {} subject(s) but step `{}` failed; dependent references may be stale",
                subject_ids.len(),
                step.as_str()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::CascadeIncomplete { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            Self::NotFound { .. } | Self::Conflict(_) => None,
        }
    }
}

impl From<SubjectValidationError> for ServiceError {
    fn from(value: SubjectValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict(detail) => Self::Conflict(detail),
            other => Self::Repo(other),
        }
    }
}
