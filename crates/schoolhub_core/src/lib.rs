//! Core domain logic for the SchoolHub subject service.
//! This crate is the single source of truth for subject invariants and the
//! delete cascade across teachers and students.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::roster::{
    AttendanceEntry, AttendanceStatus, ExamResult, School, SchoolClass, Student, StudentId,
    Teacher,
};
pub use model::subject::{
    ClassId, SchoolId, Subject, SubjectDraft, SubjectField, SubjectId, SubjectValidationError,
    SubjectView, TeacherId,
};
pub use model::EntityKind;
pub use repo::directory_repo::{ClassDirectory, SchoolDirectory, SqliteDirectory};
pub use repo::student_repo::{SqliteStudentStore, StudentStore};
pub use repo::subject_repo::{
    SqliteSubjectRepository, SubjectListQuery, SubjectRepository, SubjectScope,
};
pub use repo::teacher_repo::{SqliteTeacherStore, TeacherStore};
pub use repo::{RepoError, RepoResult};
pub use service::reference_maintainer::{
    Deletion, ReferenceMaintainer, ScrubReport, StudentScrubPolicy,
};
pub use service::subject_registry::SubjectRegistry;
pub use service::{CascadeStep, ErrorKind, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
