use std::fmt;

use chrono::{DateTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 令牌的随机字节数。
const TOKEN_BYTES: usize = 32;

/// 用户唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<UserId> for i64 {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// 已认证的身份：`(user_id, username)`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }

    /// user_id 为正且用户名非空
    pub fn is_well_formed(&self) -> bool {
        self.user_id.is_positive() && !self.username.trim().is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.username, self.user_id)
    }
}

/// 连接唯一标识，进程生命周期内不重复。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 不可猜测的会话令牌（32 字节随机数，base64url 编码）。
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// 使用线程本地的密码学安全随机数生成器生成新令牌
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(BASE64URL_NOPAD.encode(&bytes))
    }

    /// 解析客户端提交的令牌，只拒绝空值
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_argument("token", "cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// 令牌是凭证，调试输出中只保留前缀
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionToken({prefix}…)")
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_tokens_are_unique_and_url_safe() {
        let tokens: HashSet<String> = (0..256)
            .map(|_| SessionToken::generate().as_str().to_owned())
            .collect();
        assert_eq!(tokens.len(), 256);
        for token in &tokens {
            // 32 字节 → 43 个 base64url 字符（无填充）
            assert_eq!(token.len(), 43);
            assert!(token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_parse_rejects_empty_token() {
        assert!(SessionToken::parse("").is_err());
        assert!(SessionToken::parse("   ").is_err());
        assert_eq!(SessionToken::parse("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_debug_does_not_leak_full_token() {
        let token = SessionToken::parse("abcdefghijklmnop").unwrap();
        let printed = format!("{token:?}");
        assert!(!printed.contains("ghijklmnop"));
    }

    #[test]
    fn test_identity_well_formed() {
        assert!(Identity::new(7, "ann").is_well_formed());
        assert!(!Identity::new(0, "ann").is_well_formed());
        assert!(!Identity::new(-3, "ann").is_well_formed());
        assert!(!Identity::new(7, "").is_well_formed());
    }

    #[test]
    fn test_identity_serializes_flat_user_id() {
        let json = serde_json::to_value(Identity::new(7, "ann")).unwrap();
        assert_eq!(json, serde_json::json!({"user_id": 7, "username": "ann"}));
    }
}
