//! Referential integrity maintainer for subject deletion.
//!
//! # Responsibility
//! - Delete subjects (one, by school, by class) and reconcile the teacher
//!   and student collections that point at them.
//! - Offer `rescrub` as the repair path after a partial cascade.
//!
//! # Invariants
//! - The parent delete runs first and is never rolled back.
//! - Removed ids are captured from the delete itself, not re-queried.
//! - Every reconcile step is idempotent; re-running it on clean data
//!   changes nothing.
//! - A failing step stops the cascade; later steps are not attempted.

use crate::model::subject::{ClassId, SchoolId, Subject, SubjectId};
use crate::model::EntityKind;
use crate::repo::student_repo::StudentStore;
use crate::repo::subject_repo::{SubjectRepository, SubjectScope};
use crate::repo::teacher_repo::TeacherStore;
use crate::repo::RepoError;
use crate::service::{CascadeStep, ServiceError, ServiceResult};
use log::{error, info};

/// How bulk deletes treat student exam/attendance data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StudentScrubPolicy {
    /// Remove only entries tagged with a removed subject.
    #[default]
    MatchingEntries,
    /// Empty every student's sequences regardless of subject.
    ResetAll,
}

impl StudentScrubPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MatchingEntries => "matching_entries",
            Self::ResetAll => "reset_all",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "matching_entries" => Some(Self::MatchingEntries),
            "reset_all" => Some(Self::ResetAll),
            _ => None,
        }
    }
}

/// Counts of dependent records touched by one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrubReport {
    pub teachers_cleared: usize,
    pub students_scrubbed: usize,
}

impl ScrubReport {
    pub fn is_noop(&self) -> bool {
        self.teachers_cleared == 0 && self.students_scrubbed == 0
    }
}

/// Result of a delete: what was removed and what was reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion<T> {
    pub removed: T,
    pub scrub: ScrubReport,
}

/// Cascade-delete service over subject, teacher and student stores.
pub struct ReferenceMaintainer<S, T, U> {
    subjects: S,
    teachers: T,
    students: U,
    bulk_policy: StudentScrubPolicy,
}

impl<S, T, U> ReferenceMaintainer<S, T, U>
where
    S: SubjectRepository,
    T: TeacherStore,
    U: StudentStore,
{
    pub fn new(subjects: S, teachers: T, students: U) -> Self {
        Self {
            subjects,
            teachers,
            students,
            bulk_policy: StudentScrubPolicy::default(),
        }
    }

    pub fn with_bulk_policy(mut self, policy: StudentScrubPolicy) -> Self {
        self.bulk_policy = policy;
        self
    }

    pub fn bulk_policy(&self) -> StudentScrubPolicy {
        self.bulk_policy
    }

    /// Deletes one subject and scrubs references to it.
    ///
    /// # Errors
    /// - `NotFound` when the subject does not exist; nothing else runs.
    /// - `CascadeIncomplete` when a reconcile step fails after the delete.
    pub fn delete_one(&self, id: SubjectId) -> ServiceResult<Deletion<Subject>> {
        let removed = self
            .subjects
            .delete_subject(id)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Subject, id))?;

        let ids = [removed.id];
        let teachers_cleared = self
            .teachers
            .clear_subject_reference(removed.id)
            .map_err(|err| self.incomplete(CascadeStep::ClearTeacherReferences, &ids, err))?;
        let students_scrubbed = self
            .students
            .remove_subject_entries(removed.id)
            .map_err(|err| self.incomplete(CascadeStep::ScrubStudentEntries, &ids, err))?;

        let scrub = ScrubReport {
            teachers_cleared,
            students_scrubbed,
        };
        info!(
            "event=subject_cascade module=service status=ok scope=one subject_id={} teachers_cleared={} students_scrubbed={}",
            id, scrub.teachers_cleared, scrub.students_scrubbed
        );
        Ok(Deletion { removed, scrub })
    }

    /// Deletes every subject of a school and scrubs references to them.
    pub fn delete_all_by_school(&self, school_id: SchoolId) -> ServiceResult<Deletion<Vec<Subject>>> {
        self.delete_scope(SubjectScope::School(school_id))
    }

    /// Deletes every subject of a class and scrubs references to them.
    pub fn delete_all_by_class(&self, class_id: ClassId) -> ServiceResult<Deletion<Vec<Subject>>> {
        self.delete_scope(SubjectScope::Class(class_id))
    }

    /// Re-runs the entry-level reconcile steps for already-removed subjects.
    ///
    /// This is the retry path for `CascadeIncomplete`. Against clean data it
    /// returns an all-zero report.
    pub fn rescrub(&self, subject_ids: &[SubjectId]) -> ServiceResult<ScrubReport> {
        let scrub = self.scrub_many(subject_ids, StudentScrubPolicy::MatchingEntries)?;
        info!(
            "event=subject_rescrub module=service status=ok subjects={} teachers_cleared={} students_scrubbed={}",
            subject_ids.len(),
            scrub.teachers_cleared,
            scrub.students_scrubbed
        );
        Ok(scrub)
    }

    fn delete_scope(&self, scope: SubjectScope) -> ServiceResult<Deletion<Vec<Subject>>> {
        let removed = self.subjects.delete_subjects(scope)?;
        if removed.is_empty() {
            info!(
                "event=subject_cascade module=service status=ok scope={} removed=0",
                scope.as_str()
            );
            return Ok(Deletion {
                removed,
                scrub: ScrubReport::default(),
            });
        }

        let ids: Vec<SubjectId> = removed.iter().map(|subject| subject.id).collect();
        let scrub = self.scrub_many(&ids, self.bulk_policy)?;
        info!(
            "event=subject_cascade module=service status=ok scope={} policy={} removed={} teachers_cleared={} students_scrubbed={}",
            scope.as_str(),
            self.bulk_policy.as_str(),
            ids.len(),
            scrub.teachers_cleared,
            scrub.students_scrubbed
        );
        Ok(Deletion { removed, scrub })
    }

    fn scrub_many(
        &self,
        ids: &[SubjectId],
        policy: StudentScrubPolicy,
    ) -> ServiceResult<ScrubReport> {
        let teachers_cleared = self
            .teachers
            .clear_subject_references(ids)
            .map_err(|err| self.incomplete(CascadeStep::ClearTeacherReferences, ids, err))?;

        let students_scrubbed = match policy {
            StudentScrubPolicy::MatchingEntries => self.students.remove_subject_entries_many(ids),
            StudentScrubPolicy::ResetAll => self.students.reset_all_subject_data(),
        }
        .map_err(|err| self.incomplete(CascadeStep::ScrubStudentEntries, ids, err))?;

        Ok(ScrubReport {
            teachers_cleared,
            students_scrubbed,
        })
    }

    fn incomplete(&self, step: CascadeStep, ids: &[SubjectId], source: RepoError) -> ServiceError {
        error!(
            "event=subject_cascade module=service status=error step={} removed={} error={}",
            step.as_str(),
            ids.len(),
            source
        );
        ServiceError::CascadeIncomplete {
            step,
            subject_ids: ids.to_vec(),
            source,
        }
    }
}
