use domain::{DomainError, RepositoryError, SessionError};
use thiserror::Error;

use crate::connection::ConnectionError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl ApplicationError {
    /// 参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ApplicationError::Domain(DomainError::invalid_argument(field, reason))
    }
}
