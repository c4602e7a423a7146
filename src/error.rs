use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::services::examination_service::ExaminationError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Examination(#[from] ExaminationError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("External service error: {0}")]
    External(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_)
            | Error::Validation(_)
            | Error::Json(_)
            | Error::Multipart(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Examination(err) => match err {
                ExaminationError::NoValidQuestions => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            Error::External(_) | Error::Reqwest(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error_message = match self {
            Error::BadRequest(msg)
            | Error::Unauthorized(msg)
            | Error::Forbidden(msg)
            | Error::NotFound(msg)
            | Error::Internal(msg) => msg,
            Error::Examination(err) => err.to_string(),
            Error::Validation(err) => err.to_string(),
            Error::Json(err) => err.to_string(),
            Error::Multipart(err) => err.to_string(),
            Error::External(msg) => format!("External service error: {}", msg),
            Error::Reqwest(err) => format!("External service error: {}", err),
            Error::Database(err) => {
                tracing::error!(error = ?err, "database error");
                "A database error occurred".to_string()
            }
            Error::Io(err) => err.to_string(),
            Error::Anyhow(err) => err.to_string(),
            other => {
                tracing::error!(error = ?other, "unhandled error");
                "An unexpected error occurred".to_string()
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Error::BadRequest("Referenced record does not exist".to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::BadRequest("A record with the same unique key already exists".to_string())
            }
            other => Error::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_mismatch_is_a_bad_request_with_both_totals() {
        let err = Error::from(ExaminationError::QuotaMismatch {
            by_level: 3,
            by_type: 2,
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("(3)"));
        assert!(err.to_string().contains("(2)"));
    }

    #[test]
    fn missing_questions_map_to_not_found() {
        let err = Error::from(ExaminationError::NoValidQuestions);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
