//! JSON envelope shared by every endpoint and the error-to-status mapping.

use axum::http::StatusCode;
use axum::response::Json;
use log::{error, warn};
use schoolhub_core::{ErrorKind, ScrubReport, ServiceError};
use serde::Serialize;
use serde_json::{json, Value};

pub const NO_SUBJECTS_FOUND: &str = "No subjects found";

/// Error body carried by failed responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn error(code: &str, message: String, detail: Option<Value>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(ErrorBody {
                code: code.to_string(),
                message,
                detail,
            }),
        }
    }
}

pub type ErrorResponse = (StatusCode, Json<ApiResponse<()>>);
pub type HandlerResult<T> = Result<Json<ApiResponse<T>>, ErrorResponse>;

/// Listing payload; an empty list carries the explicit "nothing found" message.
pub fn listing<T>(items: Vec<T>) -> Json<ApiResponse<Vec<T>>> {
    if items.is_empty() {
        Json(ApiResponse::success(items).with_message(NO_SUBJECTS_FOUND))
    } else {
        Json(ApiResponse::success(items))
    }
}

/// Cascade counters as exposed over HTTP.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrubCounts {
    pub teachers_cleared: usize,
    pub students_scrubbed: usize,
}

impl From<ScrubReport> for ScrubCounts {
    fn from(value: ScrubReport) -> Self {
        Self {
            teachers_cleared: value.teachers_cleared,
            students_scrubbed: value.students_scrubbed,
        }
    }
}

pub fn invalid_input(field: &str, message: impl Into<String>) -> ErrorResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(
            "INVALID_INPUT",
            message.into(),
            Some(json!({ "field": field })),
        )),
    )
}

/// 500 response whose detail carries the underlying store error text.
pub fn internal_error(context: &str, err: impl std::fmt::Display) -> ErrorResponse {
    let cause = err.to_string();
    error!("event=http_request module=server status=error context={context} error={cause}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error(
            "INTERNAL_ERROR",
            "internal server error".to_string(),
            Some(json!({ "context": context, "error": cause })),
        )),
    )
}

/// Converts a service error into status code and error envelope.
pub fn service_error_to_response(err: ServiceError) -> ErrorResponse {
    let status = match err.kind() {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = err.to_string();

    let (code, detail) = match &err {
        ServiceError::InvalidInput(validation) => (
            "INVALID_INPUT",
            Some(json!({ "field": validation.field_path() })),
        ),
        ServiceError::NotFound { entity, id } => (
            "NOT_FOUND",
            Some(json!({ "entity": entity.as_str(), "id": id })),
        ),
        ServiceError::Conflict(store_detail) => {
            ("DUPLICATE_SUBJECT_CODE", Some(Value::String(store_detail.clone())))
        }
        ServiceError::CascadeIncomplete {
            step,
            subject_ids,
            source,
        } => {
            error!(
                "event=http_request module=server status=error code=CASCADE_INCOMPLETE step={} removed={} error={}",
                step.as_str(),
                subject_ids.len(),
                err
            );
            (
                "CASCADE_INCOMPLETE",
                Some(json!({
                    "step": step.as_str(),
                    "subjectIds": subject_ids,
                    "error": source.to_string(),
                })),
            )
        }
        ServiceError::Repo(source) => return internal_error("repository", source),
    };

    if status != StatusCode::INTERNAL_SERVER_ERROR {
        warn!(
            "event=http_request module=server status=rejected code={} http_status={}",
            code,
            status.as_u16()
        );
    }
    (status, Json(ApiResponse::error(code, message, detail)))
}

#[cfg(test)]
mod tests {
    use super::{listing, service_error_to_response, NO_SUBJECTS_FOUND};
    use axum::http::StatusCode;
    use schoolhub_core::{
        CascadeStep, EntityKind, RepoError, ServiceError, SubjectValidationError,
    };
    use uuid::Uuid;

    #[test]
    fn service_errors_map_to_status_and_code() {
        let cases = [
            (
                ServiceError::InvalidInput(SubjectValidationError::EmptyBatch),
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
            ),
            (
                ServiceError::NotFound {
                    entity: EntityKind::Class,
                    id: Uuid::new_v4(),
                },
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                ServiceError::Conflict("code `M1` already exists".to_string()),
                StatusCode::CONFLICT,
                "DUPLICATE_SUBJECT_CODE",
            ),
            (
                ServiceError::CascadeIncomplete {
                    step: CascadeStep::ScrubStudentEntries,
                    subject_ids: vec![Uuid::new_v4()],
                    source: RepoError::InvalidData("offline".to_string()),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "CASCADE_INCOMPLETE",
            ),
            (
                ServiceError::Repo(RepoError::InvalidData("bad row".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            let (actual_status, body) = service_error_to_response(err);
            assert_eq!(actual_status, status);
            assert!(!body.0.success);
            assert_eq!(body.0.error.as_ref().unwrap().code, code);
        }
    }

    #[test]
    fn internal_errors_carry_the_store_detail() {
        let (_, body) = service_error_to_response(ServiceError::Repo(RepoError::InvalidData(
            "invalid uuid value `x` in subjects.uuid".to_string(),
        )));
        let error = body.0.error.unwrap();
        assert_eq!(error.code, "INTERNAL_ERROR");
        let detail = error.detail.unwrap();
        assert_eq!(detail["context"], "repository");
        assert_eq!(
            detail["error"],
            "invalid persisted data: invalid uuid value `x` in subjects.uuid"
        );
    }

    #[test]
    fn cascade_incomplete_lists_step_ids_and_cause() {
        let removed = Uuid::new_v4();
        let (_, body) = service_error_to_response(ServiceError::CascadeIncomplete {
            step: CascadeStep::ClearTeacherReferences,
            subject_ids: vec![removed],
            source: RepoError::InvalidData("teacher store offline".to_string()),
        });
        let detail = body.0.error.unwrap().detail.unwrap();
        assert_eq!(detail["step"], "clear_teacher_references");
        assert_eq!(detail["subjectIds"][0], removed.to_string());
        assert_eq!(
            detail["error"],
            "invalid persisted data: teacher store offline"
        );
    }

    #[test]
    fn empty_listing_carries_message() {
        let empty = listing::<u8>(Vec::new());
        assert_eq!(empty.0.message.as_deref(), Some(NO_SUBJECTS_FOUND));
        assert_eq!(empty.0.data.as_ref().map(Vec::len), Some(0));

        let full = listing(vec![1u8]);
        assert!(full.0.message.is_none());
    }
}
