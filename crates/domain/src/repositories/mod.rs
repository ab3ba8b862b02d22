//! 存储接口定义

pub mod session_repository;

pub use session_repository::*;

pub type RepositoryResult<T> = Result<T, crate::errors::RepositoryError>;
