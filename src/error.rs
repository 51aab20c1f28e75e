use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures surfaced by the reading ingestion path.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sea_orm::DbErr),

    /// An insert would have produced a second unresolved alert for the sensor.
    #[error("Sensor {0} already has an unresolved alert")]
    InvariantViolation(i32),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::Database(e) | Self::Ingest(IngestError::Persistence(e)) => {
                tracing::error!("Database error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            Self::Ingest(IngestError::NotFound(msg)) | Self::NotFound(msg) => {
                (StatusCode::NOT_FOUND, msg.clone())
            }
            Self::Ingest(e @ IngestError::InvariantViolation(_)) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn ingest_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(IngestError::NotFound("Sensor 9 not found".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(IngestError::InvariantViolation(9).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(IngestError::Persistence(sea_orm::DbErr::RecordNotUpdated).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn service_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(AppError::ServiceUnavailable("Database unreachable".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AppError::BadRequest("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::NotFound("Tank not found".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
