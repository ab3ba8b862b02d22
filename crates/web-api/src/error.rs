use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError, SessionError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        match error {
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Session(SessionError::Expired) => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "SESSION_EXPIRED",
                "session expired, please log in again",
            ),
            AppErr::Session(SessionError::InvalidIdentity) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_IDENTITY",
                "invalid user data for session creation",
            ),
            AppErr::Session(SessionError::Storage(repo_err)) | AppErr::Repository(repo_err) => {
                match repo_err {
                    RepositoryError::NotFound => ApiError::new(
                        StatusCode::NOT_FOUND,
                        "NOT_FOUND",
                        "requested resource not found",
                    ),
                    RepositoryError::Conflict => {
                        ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
                    }
                    RepositoryError::Storage { message } => {
                        tracing::error!(error = %message, "session storage failure");
                        ApiError::new(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "STORAGE_ERROR",
                            "session storage unavailable",
                        )
                    }
                }
            }
            AppErr::Session(SessionError::NotFound | SessionError::Invalid) => {
                ApiError::unauthenticated("please log in")
            }
            AppErr::Connection(err) => ApiError::internal_server_error(err.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_distinct_codes() {
        let not_found = ApiError::from(SessionError::NotFound);
        assert_eq!(not_found.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(not_found.body.code, "UNAUTHENTICATED");

        let expired = ApiError::from(SessionError::Expired);
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.body.code, "SESSION_EXPIRED");

        let identity = ApiError::from(SessionError::InvalidIdentity);
        assert_eq!(identity.status(), StatusCode::BAD_REQUEST);

        let storage = ApiError::from(SessionError::Storage(RepositoryError::storage("boom")));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!storage.body.message.contains("boom"));
    }
}
