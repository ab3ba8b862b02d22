//! 领域模型错误定义
//!
//! 会话相关的错误需要让调用方区分“请登录”（`NotFound` / `Invalid`）
//! 与“会话已过期”（`Expired`）两种情况。

use thiserror::Error;

/// 值对象校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 存储层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 会话解析与创建的结果错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// 缓存和持久层都不存在该令牌
    #[error("session not found")]
    NotFound,
    /// 令牌存在但已过期
    #[error("session expired")]
    Expired,
    /// 令牌格式不正确（例如为空）或记录本身无效
    #[error("invalid session")]
    Invalid,
    /// 创建会话时身份不合法（user_id <= 0 或用户名为空）
    #[error("invalid user data for session creation")]
    InvalidIdentity,
    #[error("session storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
