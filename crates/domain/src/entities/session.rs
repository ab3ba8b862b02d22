//! 会话实体
//!
//! 会话把不可猜测的令牌绑定到一个已认证身份上，并带有绝对过期时间。

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::value_objects::{Identity, SessionToken, Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub identity: Identity,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    /// 以 `now` 为创建时间签发新会话，过期时间为 `now + duration`
    pub fn issue(identity: Identity, now: Timestamp, duration: Duration) -> Self {
        Self {
            token: SessionToken::generate(),
            identity,
            created_at: now,
            expires_at: now + duration,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    /// 当前时间不早于过期时间即视为过期
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// 令牌非空、身份合法且未过期
    pub fn is_valid(&self, now: Timestamp) -> bool {
        !self.token.as_str().is_empty()
            && self.identity.user_id.is_positive()
            && !self.is_expired(now)
    }

    /// 续期：过期时间改为 `now + duration`
    pub fn renewed(mut self, now: Timestamp, duration: Duration) -> Self {
        self.expires_at = now + duration;
        self
    }
}
