//! Subject registry use-case service.
//!
//! # Responsibility
//! - Validate and persist subject batches for one class of one school.
//! - Serve scope listings and detail reads joined with display names.
//! - Record teacher assignment on both sides of the reference.
//!
//! # Invariants
//! - Input validation runs before directory lookups and before any write.
//! - Owning class and school must resolve through the injected directories.
//! - Listings return `Ok(vec![])` for empty scopes, never an error.

use crate::model::subject::{
    normalize_batch, ClassId, SchoolId, Subject, SubjectDraft, SubjectId, SubjectView, TeacherId,
};
use crate::model::EntityKind;
use crate::repo::directory_repo::{ClassDirectory, SchoolDirectory};
use crate::repo::subject_repo::{SubjectListQuery, SubjectRepository, SubjectScope};
use crate::repo::teacher_repo::TeacherStore;
use crate::service::{ServiceError, ServiceResult};
use log::{info, warn};
use std::collections::HashMap;

/// Subject registry facade over its stores and directories.
pub struct SubjectRegistry<S, C, A, T> {
    subjects: S,
    classes: C,
    schools: A,
    teachers: T,
}

impl<S, C, A, T> SubjectRegistry<S, C, A, T>
where
    S: SubjectRepository,
    C: ClassDirectory,
    A: SchoolDirectory,
    T: TeacherStore,
{
    pub fn new(subjects: S, classes: C, schools: A, teachers: T) -> Self {
        Self {
            subjects,
            classes,
            schools,
            teachers,
        }
    }

    /// Creates one subject per draft, all owned by `class_id`/`school_id`.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty batch or the first blank field.
    /// - `NotFound` when the class or school does not exist.
    /// - `Conflict` when a code is already used in the school (or repeats
    ///   inside the batch). The batch is then not persisted at all.
    pub fn create_batch(
        &self,
        class_id: ClassId,
        school_id: SchoolId,
        drafts: &[SubjectDraft],
    ) -> ServiceResult<Vec<Subject>> {
        let normalized = normalize_batch(drafts)?;

        if !self.classes.class_exists(class_id)? {
            return Err(ServiceError::not_found(EntityKind::Class, class_id));
        }
        if !self.schools.school_exists(school_id)? {
            return Err(ServiceError::not_found(EntityKind::School, school_id));
        }

        match self.subjects.insert_batch(class_id, school_id, &normalized) {
            Ok(created) => {
                info!(
                    "event=subject_create module=service status=ok class_id={} school_id={} count={}",
                    class_id,
                    school_id,
                    created.len()
                );
                Ok(created)
            }
            Err(err) => {
                let err = ServiceError::from(err);
                warn!(
                    "event=subject_create module=service status=error class_id={} school_id={} count={} error={}",
                    class_id,
                    school_id,
                    normalized.len(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Lists all subjects of a school, each with its class name.
    pub fn list_by_school(&self, school_id: SchoolId) -> ServiceResult<Vec<SubjectView>> {
        self.list(SubjectListQuery::all_in(SubjectScope::School(school_id)))
    }

    /// Lists all subjects of a class, each with its class name.
    pub fn list_by_class(&self, class_id: ClassId) -> ServiceResult<Vec<SubjectView>> {
        self.list(SubjectListQuery::all_in(SubjectScope::Class(class_id)))
    }

    /// Lists subjects of a class that have no teacher yet.
    pub fn list_unassigned(&self, class_id: ClassId) -> ServiceResult<Vec<SubjectView>> {
        self.list(SubjectListQuery::unassigned_in(SubjectScope::Class(class_id)))
    }

    /// Returns one subject with class and teacher names resolved.
    ///
    /// A subject without a teacher is not an error; `teacher_name` is `None`.
    pub fn get_detail(&self, id: SubjectId) -> ServiceResult<SubjectView> {
        let subject = self
            .subjects
            .get_subject(id)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Subject, id))?;

        let class_name = self.classes.class_name(subject.class_id)?;
        let teacher_name = match subject.teacher_id {
            Some(teacher_id) => self.teachers.teacher_name(teacher_id)?,
            None => None,
        };

        Ok(SubjectView {
            subject,
            class_name,
            teacher_name,
        })
    }

    /// Makes `teacher_id` the teacher of subject `id`.
    ///
    /// Any previous teacher of the subject is released, and any subject the
    /// teacher previously held loses its teacher.
    pub fn assign_teacher(&self, id: SubjectId, teacher_id: TeacherId) -> ServiceResult<SubjectView> {
        if self.subjects.get_subject(id)?.is_none() {
            return Err(ServiceError::not_found(EntityKind::Subject, id));
        }
        if self.teachers.teacher_name(teacher_id)?.is_none() {
            return Err(ServiceError::not_found(EntityKind::Teacher, teacher_id));
        }

        self.teachers.clear_subject_reference(id)?;
        self.teachers.assign_subject(teacher_id, id)?;
        self.subjects.set_teacher(id, teacher_id)?;

        info!(
            "event=subject_assign_teacher module=service status=ok subject_id={} teacher_id={}",
            id, teacher_id
        );
        self.get_detail(id)
    }

    fn list(&self, query: SubjectListQuery) -> ServiceResult<Vec<SubjectView>> {
        let subjects = self.subjects.list_subjects(&query)?;

        let mut class_names: HashMap<ClassId, Option<String>> = HashMap::new();
        let mut views = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let class_name = match class_names.get(&subject.class_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.classes.class_name(subject.class_id)?;
                    class_names.insert(subject.class_id, name.clone());
                    name
                }
            };
            views.push(SubjectView {
                subject,
                class_name,
                teacher_name: None,
            });
        }

        Ok(views)
    }
}
