//! Subject REST endpoints.
//!
//! Handlers parse ids and bodies, then run the registry or cascade on a
//! blocking worker with a connection opened for that request.

use crate::response::{
    internal_error, invalid_input, listing, service_error_to_response, ApiResponse,
    ErrorResponse, HandlerResult, ScrubCounts,
};
use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use schoolhub_core::db::open_db;
use schoolhub_core::{
    core_version, ReferenceMaintainer, RepoError, ServiceResult, SqliteDirectory,
    SqliteStudentStore, SqliteSubjectRepository, SqliteTeacherStore, StudentScrubPolicy,
    Subject, SubjectDraft, SubjectRegistry, SubjectView,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

type Registry<'conn> = SubjectRegistry<
    SqliteSubjectRepository<'conn>,
    SqliteDirectory<'conn>,
    SqliteDirectory<'conn>,
    SqliteTeacherStore<'conn>,
>;

type Maintainer<'conn> = ReferenceMaintainer<
    SqliteSubjectRepository<'conn>,
    SqliteTeacherStore<'conn>,
    SqliteStudentStore<'conn>,
>;

/// Shared handler state: where the database lives and how bulk deletes
/// treat student data.
#[derive(Debug, Clone)]
pub struct AppState {
    db_path: Arc<PathBuf>,
    bulk_policy: StudentScrubPolicy,
}

impl AppState {
    pub fn new(db_path: impl Into<PathBuf>, bulk_policy: StudentScrubPolicy) -> Self {
        Self {
            db_path: Arc::new(db_path.into()),
            bulk_policy,
        }
    }
}

/// Subject creation request DTO.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubjectsRequest {
    #[serde(default, alias = "sclassName")]
    pub class_id: String,
    #[serde(default, alias = "adminID")]
    pub school_id: String,
    #[serde(default)]
    pub subjects: Vec<SubjectDraft>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTeacherRequest {
    #[serde(default)]
    pub teacher_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescrubRequest {
    #[serde(default)]
    pub subject_ids: Vec<String>,
}

/// Delete response DTO.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionResponse<T> {
    pub removed: T,
    pub deleted_count: usize,
    #[serde(flatten)]
    pub scrub: ScrubCounts,
}

fn registry(conn: &Connection) -> ServiceResult<Registry<'_>> {
    Ok(SubjectRegistry::new(
        SqliteSubjectRepository::try_new(conn)?,
        SqliteDirectory::try_new(conn)?,
        SqliteDirectory::try_new(conn)?,
        SqliteTeacherStore::try_new(conn)?,
    ))
}

fn maintainer(conn: &Connection, policy: StudentScrubPolicy) -> ServiceResult<Maintainer<'_>> {
    Ok(ReferenceMaintainer::new(
        SqliteSubjectRepository::try_new(conn)?,
        SqliteTeacherStore::try_new(conn)?,
        SqliteStudentStore::try_new(conn)?,
    )
    .with_bulk_policy(policy))
}

/// Runs `work` on a blocking worker against a fresh connection.
async fn with_connection<T, F>(state: &AppState, work: F) -> Result<T, ErrorResponse>
where
    F: FnOnce(&Connection, StudentScrubPolicy) -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db_path = Arc::clone(&state.db_path);
    let policy = state.bulk_policy;
    let joined = tokio::task::spawn_blocking(move || -> ServiceResult<T> {
        let conn = open_db(db_path.as_path()).map_err(RepoError::from)?;
        work(&conn, policy)
    })
    .await;

    match joined {
        Ok(result) => result.map_err(service_error_to_response),
        Err(err) => Err(internal_error("blocking_task", err)),
    }
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, ErrorResponse> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| invalid_input(field, format!("{field} must be a valid UUID")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ErrorResponse> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| invalid_input("body", rejection.body_text()))
}

async fn health() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(
        json!({ "status": "ok", "version": core_version() }),
    ))
}

/// Create a batch of subjects for one class
async fn create_subjects(
    State(state): State<AppState>,
    payload: Result<Json<CreateSubjectsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<Subject>>>), ErrorResponse> {
    let request = body(payload)?;
    let class_id = parse_id("classId", &request.class_id)?;
    let school_id = parse_id("schoolId", &request.school_id)?;

    let created = with_connection(&state, move |conn, _| {
        registry(conn)?.create_batch(class_id, school_id, &request.subjects)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

async fn list_school_subjects(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<Vec<SubjectView>> {
    let school_id = parse_id("schoolId", &raw_id)?;
    let views =
        with_connection(&state, move |conn, _| registry(conn)?.list_by_school(school_id)).await?;
    Ok(listing(views))
}

async fn list_class_subjects(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<Vec<SubjectView>> {
    let class_id = parse_id("classId", &raw_id)?;
    let views =
        with_connection(&state, move |conn, _| registry(conn)?.list_by_class(class_id)).await?;
    Ok(listing(views))
}

/// Subjects of a class that no teacher has taken yet
async fn list_unassigned_subjects(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<Vec<SubjectView>> {
    let class_id = parse_id("classId", &raw_id)?;
    let views =
        with_connection(&state, move |conn, _| registry(conn)?.list_unassigned(class_id)).await?;
    Ok(listing(views))
}

async fn get_subject(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<SubjectView> {
    let subject_id = parse_id("subjectId", &raw_id)?;
    let view =
        with_connection(&state, move |conn, _| registry(conn)?.get_detail(subject_id)).await?;
    Ok(Json(ApiResponse::success(view)))
}

async fn delete_subject(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<DeletionResponse<Subject>> {
    let subject_id = parse_id("subjectId", &raw_id)?;
    let deletion = with_connection(&state, move |conn, policy| {
        maintainer(conn, policy)?.delete_one(subject_id)
    })
    .await?;

    Ok(Json(ApiResponse::success(DeletionResponse {
        removed: deletion.removed,
        deleted_count: 1,
        scrub: deletion.scrub.into(),
    })))
}

async fn delete_school_subjects(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<DeletionResponse<Vec<Subject>>> {
    let school_id = parse_id("schoolId", &raw_id)?;
    let deletion = with_connection(&state, move |conn, policy| {
        maintainer(conn, policy)?.delete_all_by_school(school_id)
    })
    .await?;

    Ok(Json(ApiResponse::success(DeletionResponse {
        deleted_count: deletion.removed.len(),
        removed: deletion.removed,
        scrub: deletion.scrub.into(),
    })))
}

async fn delete_class_subjects(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<DeletionResponse<Vec<Subject>>> {
    let class_id = parse_id("classId", &raw_id)?;
    let deletion = with_connection(&state, move |conn, policy| {
        maintainer(conn, policy)?.delete_all_by_class(class_id)
    })
    .await?;

    Ok(Json(ApiResponse::success(DeletionResponse {
        deleted_count: deletion.removed.len(),
        removed: deletion.removed,
        scrub: deletion.scrub.into(),
    })))
}

async fn assign_teacher(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<AssignTeacherRequest>, JsonRejection>,
) -> HandlerResult<SubjectView> {
    let subject_id = parse_id("subjectId", &raw_id)?;
    let request = body(payload)?;
    let teacher_id = parse_id("teacherId", &request.teacher_id)?;

    let view = with_connection(&state, move |conn, _| {
        registry(conn)?.assign_teacher(subject_id, teacher_id)
    })
    .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Repair dependent references after an incomplete cascade
async fn rescrub_references(
    State(state): State<AppState>,
    payload: Result<Json<RescrubRequest>, JsonRejection>,
) -> HandlerResult<ScrubCounts> {
    let request = body(payload)?;
    let subject_ids = request
        .subject_ids
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_id(&format!("subjectIds[{index}]"), raw))
        .collect::<Result<Vec<_>, _>>()?;

    let scrub = with_connection(&state, move |conn, policy| {
        maintainer(conn, policy)?.rescrub(&subject_ids)
    })
    .await?;
    Ok(Json(ApiResponse::success(scrub.into())))
}

/// Builds the HTTP router.
/// Route table. Any origin may call the API, as browser clients are served
/// from a separate host.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/subjects", post(create_subjects))
        .route("/subjects/references/rescrub", post(rescrub_references))
        .route("/subjects/:id", get(get_subject).delete(delete_subject))
        .route("/subjects/:id/teacher", post(assign_teacher))
        .route(
            "/schools/:id/subjects",
            get(list_school_subjects).delete(delete_school_subjects),
        )
        .route(
            "/classes/:id/subjects",
            get(list_class_subjects).delete(delete_class_subjects),
        )
        .route("/classes/:id/subjects/unassigned", get(list_unassigned_subjects))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::{parse_id, CreateSubjectsRequest};
    use axum::http::StatusCode;

    #[test]
    fn create_request_accepts_legacy_field_names() {
        let request: CreateSubjectsRequest = serde_json::from_str(
            r#"{
                "sclassName": "c3f1b1d2-8d7e-4b8c-9a43-0d2a3f5e6a71",
                "adminID": "0f6a2d33-1c2b-4a5e-8f90-3b7c1e2d4f55",
                "subjects": [{ "subName": "Maths", "subCode": "M7", "sessions": "20" }]
            }"#,
        )
        .unwrap();

        assert_eq!(request.class_id, "c3f1b1d2-8d7e-4b8c-9a43-0d2a3f5e6a71");
        assert_eq!(request.school_id, "0f6a2d33-1c2b-4a5e-8f90-3b7c1e2d4f55");
        assert_eq!(request.subjects[0].name, "Maths");
        assert_eq!(request.subjects[0].code, "M7");
    }

    #[test]
    fn parse_id_names_the_field() {
        let (status, body) = parse_id("classId", "class-7").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body.0.error.unwrap();
        assert_eq!(error.detail.unwrap()["field"], "classId");
    }
}
