use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use archivist_core::RegistryError;

use super::commands::CommandError;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// REST error, rendered as `{ "error": ... }` with a matching status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        let status = match &err {
            CommandError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
            CommandError::Registry(RegistryError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            CommandError::Registry(RegistryError::Busy(_)) | CommandError::SyncRunning => {
                StatusCode::CONFLICT
            }
            CommandError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        CommandError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(RegistryError::NotFound(9)).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RegistryError::InvalidName("a/b".into())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RegistryError::Io("disk full".into())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(RegistryError::Busy(2)).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CommandError::SyncRunning).status,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_message_is_error_display() {
        let err = ApiError::from(RegistryError::NotFound(9));
        assert_eq!(err.message, "Channel not found: 9");
    }
}
