use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::room::{CorruptRoom, RoomError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed while serving the request.
    #[error("storage failure")]
    Storage(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("{0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current room status.
    #[error("{0}")]
    InvalidState(String),
    /// Requested room or player was not found.
    #[error("{0}")]
    NotFound(String),
    /// Operation collides with existing data.
    #[error("{0}")]
    Conflict(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// Concurrent writers kept winning the compare-and-swap race.
    #[error("room is busy, retry later")]
    Busy,
    /// A stored record could not be decoded.
    #[error(transparent)]
    Corrupt(#[from] CorruptRoom),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<RoomError> for ServiceError {
    fn from(err: RoomError) -> Self {
        let message = err.to_string();
        match err {
            RoomError::GameAlreadyStarted
            | RoomError::GameNotInProgress
            | RoomError::NoQuestions => ServiceError::InvalidState(message),
            RoomError::NameTaken => ServiceError::Conflict(message),
            RoomError::PlayerNotFound => ServiceError::NotFound(message),
            RoomError::InvalidOption(_) => ServiceError::InvalidInput(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with existing data.
    #[error("{0}")]
    Conflict(String),
    /// Operation not allowed in the current room status.
    #[error("{0}")]
    InvalidState(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidState(_) => "invalid_state",
            AppError::ServiceUnavailable(_) => "unavailable",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(source) => AppError::Internal(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::InvalidState(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::Busy => AppError::ServiceUnavailable("room is busy".into()),
            ServiceError::Corrupt(corrupt) => AppError::Internal(corrupt.to_string()),
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human readable message.
    pub error: String,
    /// Machine readable category: `validation`, `not_found`, `conflict`,
    /// `invalid_state`, `unavailable` or `internal`.
    pub kind: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            error: self.to_string(),
            kind: self.kind().into(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_errors_map_to_service_categories() {
        assert!(matches!(
            ServiceError::from(RoomError::GameAlreadyStarted),
            ServiceError::InvalidState(message) if message == "game already started"
        ));
        assert!(matches!(
            ServiceError::from(RoomError::NameTaken),
            ServiceError::Conflict(message) if message == "player name already taken"
        ));
        assert!(matches!(
            ServiceError::from(RoomError::PlayerNotFound),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            ServiceError::from(RoomError::InvalidOption(7)),
            ServiceError::InvalidInput(_)
        ));
    }

    #[test]
    fn service_errors_map_to_http_statuses() {
        let cases = [
            (ServiceError::NotFound("room not found".into()), StatusCode::NOT_FOUND, "not_found"),
            (ServiceError::Conflict("taken".into()), StatusCode::CONFLICT, "conflict"),
            (
                ServiceError::InvalidState("game is not in progress".into()),
                StatusCode::BAD_REQUEST,
                "invalid_state",
            ),
            (ServiceError::Busy, StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            (ServiceError::Timeout, StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            (ServiceError::Degraded, StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            (
                ServiceError::Storage(StorageError::Missing { key: "ABC234".into() }),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];

        for (err, status, kind) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status(), status);
            assert_eq!(app.kind(), kind);
        }
    }
}
