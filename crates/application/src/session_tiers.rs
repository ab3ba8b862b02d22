//! 会话缓存层的进程内实现
//!
//! 整个缓存由一把读写锁保护：查询可以并发，任何写操作都是独占的。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{CacheTier, Session, SessionToken, Timestamp, UserId};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryCacheTier {
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

impl InMemoryCacheTier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheTier for InMemoryCacheTier {
    async fn get(&self, token: &SessionToken) -> Option<Session> {
        self.sessions.read().await.get(token).cloned()
    }

    async fn put(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session);
    }

    async fn remove(&self, token: &SessionToken) -> Option<Session> {
        self.sessions.write().await.remove(token)
    }

    async fn remove_user(&self, user_id: UserId) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id() != user_id);
        before - sessions.len()
    }

    async fn remove_expired(&self, now: Timestamp) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// 内存实现的持久层（用于测试和无数据库的本地运行）
pub mod memory {
    use super::*;
    use domain::{DurableTier, RepositoryResult};

    #[derive(Debug, Default)]
    pub struct MemoryDurableTier {
        sessions: RwLock<HashMap<SessionToken, Session>>,
    }

    impl MemoryDurableTier {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.sessions.read().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.sessions.read().await.is_empty()
        }

        pub async fn contains(&self, token: &SessionToken) -> bool {
            self.sessions.read().await.contains_key(token)
        }
    }

    #[async_trait]
    impl DurableTier for MemoryDurableTier {
        async fn insert(&self, session: &Session) -> RepositoryResult<()> {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&session.token) {
                return Err(domain::RepositoryError::Conflict);
            }
            sessions.insert(session.token.clone(), session.clone());
            Ok(())
        }

        async fn find_valid(
            &self,
            token: &SessionToken,
            now: Timestamp,
        ) -> RepositoryResult<Option<Session>> {
            let sessions = self.sessions.read().await;
            Ok(sessions
                .get(token)
                .filter(|session| !session.is_expired(now))
                .cloned())
        }

        async fn delete(&self, token: &SessionToken) -> RepositoryResult<bool> {
            Ok(self.sessions.write().await.remove(token).is_some())
        }

        async fn delete_for_user(&self, user_id: UserId) -> RepositoryResult<u64> {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, session| session.user_id() != user_id);
            Ok((before - sessions.len()) as u64)
        }

        async fn delete_expired(&self, now: Timestamp) -> RepositoryResult<u64> {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, session| !session.is_expired(now));
            Ok((before - sessions.len()) as u64)
        }

        async fn update_expiry(
            &self,
            token: &SessionToken,
            expires_at: Timestamp,
        ) -> RepositoryResult<bool> {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(token) {
                Some(session) => {
                    session.expires_at = expires_at;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}
