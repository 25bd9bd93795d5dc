use rusqlite::Connection;
use schoolhub_core::db::open_db_in_memory;
use schoolhub_core::{
    EntityKind, ErrorKind, SchoolClass, ServiceError, SqliteDirectory, SqliteSubjectRepository,
    SqliteTeacherStore, SubjectDraft, SubjectField, SubjectRegistry, SubjectValidationError,
};
use uuid::Uuid;

type Registry<'conn> = SubjectRegistry<
    SqliteSubjectRepository<'conn>,
    SqliteDirectory<'conn>,
    SqliteDirectory<'conn>,
    SqliteTeacherStore<'conn>,
>;

fn registry(conn: &Connection) -> Registry<'_> {
    SubjectRegistry::new(
        SqliteSubjectRepository::try_new(conn).unwrap(),
        SqliteDirectory::try_new(conn).unwrap(),
        SqliteDirectory::try_new(conn).unwrap(),
        SqliteTeacherStore::try_new(conn).unwrap(),
    )
}

fn seed_class(conn: &Connection, school_name: &str, class_name: &str) -> SchoolClass {
    let directory = SqliteDirectory::try_new(conn).unwrap();
    let school = directory.create_school(school_name).unwrap();
    directory.create_class(school.id, class_name).unwrap()
}

fn subject_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM subjects;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_batch_returns_trimmed_records_in_order() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");
    let registry = registry(&conn);

    let created = registry
        .create_batch(
            class.id,
            class.school_id,
            &[
                SubjectDraft::new("  Mathematics ", " MATH7 ", " 40 "),
                SubjectDraft::new("Science", "SCI7", "35"),
            ],
        )
        .unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0].name, "Mathematics");
    assert_eq!(created[0].code, "MATH7");
    assert_eq!(created[0].sessions, "40");
    assert_eq!(created[1].code, "SCI7");
    for subject in &created {
        assert_eq!(subject.class_id, class.id);
        assert_eq!(subject.school_id, Some(class.school_id));
        assert!(!subject.is_assigned());
    }

    let listed = registry.list_by_class(class.id).unwrap();
    let listed_ids: Vec<Uuid> = listed.iter().map(|view| view.subject.id).collect();
    let created_ids: Vec<Uuid> = created.iter().map(|subject| subject.id).collect();
    assert_eq!(listed_ids, created_ids);
}

#[test]
fn create_batch_rejects_empty_batch() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");

    let err = registry(&conn)
        .create_batch(class.id, class.school_id, &[])
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(matches!(
        err,
        ServiceError::InvalidInput(SubjectValidationError::EmptyBatch)
    ));
    assert_eq!(subject_count(&conn), 0);
}

#[test]
fn create_batch_validates_fields_before_resolving_owners() {
    let conn = open_db_in_memory().unwrap();

    let err = registry(&conn)
        .create_batch(
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[
                SubjectDraft::new("Art", "ART", "10"),
                SubjectDraft::new("Music", "MUS", "   "),
            ],
        )
        .unwrap_err();

    match err {
        ServiceError::InvalidInput(SubjectValidationError::BlankField { index, field }) => {
            assert_eq!(index, 1);
            assert_eq!(field, SubjectField::Sessions);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn create_batch_requires_existing_class_and_school() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");
    let registry = registry(&conn);
    let drafts = [SubjectDraft::new("Art", "ART", "10")];

    let missing_class = Uuid::new_v4();
    match registry
        .create_batch(missing_class, class.school_id, &drafts)
        .unwrap_err()
    {
        ServiceError::NotFound { entity, id } => {
            assert_eq!(entity, EntityKind::Class);
            assert_eq!(id, missing_class);
        }
        other => panic!("unexpected error: {other}"),
    }

    let missing_school = Uuid::new_v4();
    match registry
        .create_batch(class.id, missing_school, &drafts)
        .unwrap_err()
    {
        ServiceError::NotFound { entity, id } => {
            assert_eq!(entity, EntityKind::School);
            assert_eq!(id, missing_school);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(subject_count(&conn), 0);
}

#[test]
fn create_batch_duplicate_code_in_school_is_conflict_and_persists_nothing() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");
    let registry = registry(&conn);
    registry
        .create_batch(
            class.id,
            class.school_id,
            &[SubjectDraft::new("Mathematics", "MATH7", "40")],
        )
        .unwrap();

    let err = registry
        .create_batch(
            class.id,
            class.school_id,
            &[
                SubjectDraft::new("Geography", "GEO7", "20"),
                SubjectDraft::new("Maths again", " MATH7", "40"),
            ],
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    match &err {
        ServiceError::Conflict(detail) => assert!(detail.contains("MATH7")),
        other => panic!("unexpected error: {other}"),
    }

    let math_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM subjects WHERE code = 'MATH7';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(math_rows, 1);
    assert_eq!(subject_count(&conn), 1, "batch must be all-or-nothing");
}

#[test]
fn create_batch_duplicate_code_inside_batch_is_conflict() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");

    let err = registry(&conn)
        .create_batch(
            class.id,
            class.school_id,
            &[
                SubjectDraft::new("History", "HIS", "10"),
                SubjectDraft::new("History II", "HIS", "10"),
            ],
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(subject_count(&conn), 0);
}

#[test]
fn same_code_is_allowed_in_different_schools() {
    let conn = open_db_in_memory().unwrap();
    let north = seed_class(&conn, "North High", "Grade 7");
    let south = seed_class(&conn, "South High", "Grade 7");
    let registry = registry(&conn);
    let drafts = [SubjectDraft::new("Mathematics", "MATH7", "40")];

    registry
        .create_batch(north.id, north.school_id, &drafts)
        .unwrap();
    registry
        .create_batch(south.id, south.school_id, &drafts)
        .unwrap();

    assert_eq!(subject_count(&conn), 2);
}

#[test]
fn listings_join_class_name_and_return_empty_for_empty_scope() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");
    let registry = registry(&conn);
    registry
        .create_batch(
            class.id,
            class.school_id,
            &[
                SubjectDraft::new("Mathematics", "MATH7", "40"),
                SubjectDraft::new("Science", "SCI7", "35"),
            ],
        )
        .unwrap();

    let by_school = registry.list_by_school(class.school_id).unwrap();
    assert_eq!(by_school.len(), 2);
    assert!(by_school
        .iter()
        .all(|view| view.class_name.as_deref() == Some("Grade 7")));

    assert!(registry.list_by_school(Uuid::new_v4()).unwrap().is_empty());
    assert!(registry.list_by_class(Uuid::new_v4()).unwrap().is_empty());
    assert!(registry.list_unassigned(Uuid::new_v4()).unwrap().is_empty());
}

#[test]
fn list_unassigned_skips_subjects_with_a_teacher() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");
    let registry = registry(&conn);
    let created = registry
        .create_batch(
            class.id,
            class.school_id,
            &[
                SubjectDraft::new("Mathematics", "MATH7", "40"),
                SubjectDraft::new("Science", "SCI7", "35"),
            ],
        )
        .unwrap();
    let teacher = SqliteTeacherStore::try_new(&conn)
        .unwrap()
        .create_teacher(class.school_id, "Ada")
        .unwrap();
    registry.assign_teacher(created[0].id, teacher.id).unwrap();

    let unassigned = registry.list_unassigned(class.id).unwrap();
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].subject.id, created[1].id);
}

#[test]
fn get_detail_resolves_teacher_name_only_when_assigned() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");
    let registry = registry(&conn);
    let created = registry
        .create_batch(
            class.id,
            class.school_id,
            &[
                SubjectDraft::new("Mathematics", "MATH7", "40"),
                SubjectDraft::new("Science", "SCI7", "35"),
            ],
        )
        .unwrap();
    let teacher = SqliteTeacherStore::try_new(&conn)
        .unwrap()
        .create_teacher(class.school_id, "Ada")
        .unwrap();
    registry.assign_teacher(created[0].id, teacher.id).unwrap();

    let assigned = registry.get_detail(created[0].id).unwrap();
    assert_eq!(assigned.class_name.as_deref(), Some("Grade 7"));
    assert_eq!(assigned.teacher_name.as_deref(), Some("Ada"));
    assert_eq!(assigned.subject.teacher_id, Some(teacher.id));

    let unassigned = registry.get_detail(created[1].id).unwrap();
    assert_eq!(unassigned.teacher_name, None);
    assert_eq!(unassigned.subject.teacher_id, None);

    let missing = registry.get_detail(Uuid::new_v4()).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[test]
fn assign_teacher_moves_references_on_both_sides() {
    let conn = open_db_in_memory().unwrap();
    let class = seed_class(&conn, "North High", "Grade 7");
    let registry = registry(&conn);
    let created = registry
        .create_batch(
            class.id,
            class.school_id,
            &[
                SubjectDraft::new("Mathematics", "MATH7", "40"),
                SubjectDraft::new("Science", "SCI7", "35"),
            ],
        )
        .unwrap();
    let teachers = SqliteTeacherStore::try_new(&conn).unwrap();
    let ada = teachers.create_teacher(class.school_id, "Ada").unwrap();
    let grace = teachers.create_teacher(class.school_id, "Grace").unwrap();

    registry.assign_teacher(created[0].id, ada.id).unwrap();
    // Ada moves to science; maths loses its teacher.
    registry.assign_teacher(created[1].id, ada.id).unwrap();
    // Grace takes science; Ada is released.
    let view = registry.assign_teacher(created[1].id, grace.id).unwrap();

    assert_eq!(view.teacher_name.as_deref(), Some("Grace"));
    assert_eq!(registry.get_detail(created[0].id).unwrap().subject.teacher_id, None);
    assert_eq!(teachers.get_teacher(ada.id).unwrap().unwrap().teach_subject, None);
    assert_eq!(
        teachers.get_teacher(grace.id).unwrap().unwrap().teach_subject,
        Some(created[1].id)
    );

    let err = registry
        .assign_teacher(created[0].id, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound {
            entity: EntityKind::Teacher,
            ..
        }
    ));
}
