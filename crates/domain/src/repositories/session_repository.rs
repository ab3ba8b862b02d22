//! 会话两级存储接口
//!
//! `CacheTier` 是进程内的易失缓存，`DurableTier` 是跨进程重启保留的
//! 持久存储，也是会话的最终事实来源。两者都可以在测试中替换。

use async_trait::async_trait;

use super::RepositoryResult;
use crate::entities::Session;
use crate::value_objects::{SessionToken, Timestamp, UserId};

/// 易失缓存层
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// 按令牌查找，不做过期判断
    async fn get(&self, token: &SessionToken) -> Option<Session>;

    /// 插入或覆盖
    async fn put(&self, session: Session);

    /// 删除单个令牌，返回被删除的会话
    async fn remove(&self, token: &SessionToken) -> Option<Session>;

    /// 删除某个身份的全部会话，返回删除数量
    async fn remove_user(&self, user_id: UserId) -> usize;

    /// 删除 `now` 时刻已过期的会话
    async fn remove_expired(&self, now: Timestamp) -> usize;

    async fn count(&self) -> usize;
}

/// 持久存储层
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait DurableTier: Send + Sync {
    async fn insert(&self, session: &Session) -> RepositoryResult<()>;

    /// 只返回在 `now` 时刻仍未过期的会话（用户名通过关联用户表取得）
    async fn find_valid(
        &self,
        token: &SessionToken,
        now: Timestamp,
    ) -> RepositoryResult<Option<Session>>;

    /// 删除单个令牌；不存在不是错误，返回是否真的删除了记录
    async fn delete(&self, token: &SessionToken) -> RepositoryResult<bool>;

    async fn delete_for_user(&self, user_id: UserId) -> RepositoryResult<u64>;

    async fn delete_expired(&self, now: Timestamp) -> RepositoryResult<u64>;

    /// 修改过期时间，返回记录是否存在
    async fn update_expiry(
        &self,
        token: &SessionToken,
        expires_at: Timestamp,
    ) -> RepositoryResult<bool>;
}
