//! 两级会话存储
//!
//! 读路径先查缓存，未命中再查持久层并回填缓存；写路径同时修改两层，
//! 持久层是最终事实来源。所有修改两层的路径（创建、删除、续期、
//! 发现过期后的清理）以及未命中时的回填都在同一把异步锁内串行执行，
//! 因此回填永远不会复活一个刚被作废的令牌。

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration as StdDuration;

use domain::{
    CacheTier, DurableTier, Identity, RepositoryError, Session, SessionError, SessionToken,
    Timestamp,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;

/// 会话时长上限（一年）
const MAX_SESSION_SECONDS: u64 = 365 * 24 * 60 * 60;

pub struct SessionStoreDependencies {
    pub cache: Arc<dyn CacheTier>,
    pub durable: Arc<dyn DurableTier>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// 固定会话时长，`expires_at - created_at` 恒等于它
    pub duration: chrono::Duration,
    pub sweep_interval: StdDuration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration: chrono::Duration::hours(24),
            sweep_interval: StdDuration::from_secs(60 * 60),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &config::SessionConfig) -> Self {
        let seconds = config.duration_seconds.clamp(1, MAX_SESSION_SECONDS);
        Self {
            duration: chrono::Duration::seconds(seconds as i64),
            sweep_interval: config.sweep_interval().max(StdDuration::from_secs(1)),
        }
    }
}

/// 一次清理的结果；持久层清理失败时 `durable_removed` 为 `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cache_removed: usize,
    pub durable_removed: Option<u64>,
}

pub struct SessionStore {
    deps: SessionStoreDependencies,
    settings: SessionSettings,
    mutation_lock: Mutex<()>,
    cancel: CancellationToken,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// 不带后台清理任务的存储
    pub fn new(deps: SessionStoreDependencies, settings: SessionSettings) -> Self {
        Self {
            deps,
            settings,
            mutation_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
            sweeper: StdMutex::new(None),
        }
    }

    /// 创建存储并启动周期清理任务，任务随 `shutdown` 或存储被丢弃而结束
    pub fn start(deps: SessionStoreDependencies, settings: SessionSettings) -> Arc<Self> {
        let store = Arc::new(Self::new(deps, settings));
        let task = tokio::spawn(run_sweeper(
            Arc::downgrade(&store),
            store.cancel.clone(),
            settings.sweep_interval,
        ));
        *store
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
        store
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// 为身份签发新会话，同时作废该身份已有的全部会话
    pub async fn create(&self, identity: Identity) -> Result<Session, SessionError> {
        if !identity.is_well_formed() {
            return Err(SessionError::InvalidIdentity);
        }

        let _guard = self.mutation_lock.lock().await;
        let user_id = identity.user_id;
        let cache_replaced = self.deps.cache.remove_user(user_id).await;
        let durable_replaced = self.deps.durable.delete_for_user(user_id).await?;

        let session = Session::issue(identity, self.deps.clock.now(), self.settings.duration);
        match self.deps.durable.insert(&session).await {
            Ok(()) => {}
            // 持久层中没有这个用户
            Err(RepositoryError::NotFound) => {
                warn!(user_id = %user_id, "session rejected for unknown user");
                return Err(SessionError::InvalidIdentity);
            }
            Err(err) => return Err(err.into()),
        }
        self.deps.cache.put(session.clone()).await;

        info!(
            user_id = %user_id,
            cache_replaced,
            durable_replaced,
            expires_at = %session.expires_at,
            "session created"
        );
        Ok(session)
    }

    /// 返回完整的会话记录
    pub async fn lookup(&self, token: &str) -> Result<Session, SessionError> {
        let token = parse_token(token)?;

        if let Some(session) = self.deps.cache.get(&token).await {
            if session.is_valid(self.deps.clock.now()) {
                return Ok(session);
            }
        }

        let _guard = self.mutation_lock.lock().await;
        let now = self.deps.clock.now();
        // 等锁期间缓存可能已被回填、续期或清理，重新读取
        if let Some(session) = self.deps.cache.get(&token).await {
            return self.verify_locked(session, now).await;
        }

        match self.deps.durable.find_valid(&token, now).await? {
            Some(session) if session.is_valid(now) => {
                self.deps.cache.put(session.clone()).await;
                debug!(user_id = %session.user_id(), "session cache filled from durable store");
                Ok(session)
            }
            Some(_) => Err(SessionError::Invalid),
            None => Err(SessionError::NotFound),
        }
    }

    /// 令牌 -> 身份
    pub async fn resolve(&self, token: &str) -> Result<Identity, SessionError> {
        self.lookup(token).await.map(|session| session.identity)
    }

    /// 删除令牌；不存在不是错误
    pub async fn delete(&self, token: &str) -> Result<(), SessionError> {
        let Ok(token) = parse_token(token) else {
            return Ok(());
        };
        let _guard = self.mutation_lock.lock().await;
        let cached = self.deps.cache.remove(&token).await;
        let deleted = self.deps.durable.delete(&token).await?;
        if let Some(session) = cached {
            info!(user_id = %session.user_id(), "session deleted");
        } else if deleted {
            info!("session deleted from durable store");
        }
        Ok(())
    }

    /// 续期：返回新的过期时间，调用方据此重新下发凭证
    pub async fn refresh(&self, token: &str) -> Result<Session, SessionError> {
        let session = self.lookup(token).await?;

        let _guard = self.mutation_lock.lock().await;
        let now = self.deps.clock.now();
        let renewed = session.renewed(now, self.settings.duration);
        if !self
            .deps
            .durable
            .update_expiry(&renewed.token, renewed.expires_at)
            .await?
        {
            // 在续期前已被并发的创建或删除作废
            self.deps.cache.remove(&renewed.token).await;
            return Err(SessionError::NotFound);
        }
        self.deps.cache.put(renewed.clone()).await;
        debug!(user_id = %renewed.user_id(), expires_at = %renewed.expires_at, "session refreshed");
        Ok(renewed)
    }

    /// 清理两层中已过期的会话；持久层失败只记录日志，缓存清理照常进行
    pub async fn sweep(&self) -> SweepReport {
        let now = self.deps.clock.now();
        let durable_removed = match self.deps.durable.delete_expired(now).await {
            Ok(removed) => Some(removed),
            Err(err) => {
                warn!(error = %err, "failed to sweep expired sessions from durable store");
                None
            }
        };
        let cache_removed = self.deps.cache.remove_expired(now).await;
        SweepReport {
            cache_removed,
            durable_removed,
        }
    }

    /// 缓存中的会话数量
    pub async fn count(&self) -> usize {
        self.deps.cache.count().await
    }

    /// 停止清理任务并等待其退出
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "session sweeper terminated abnormally");
            }
        }
    }

    // 调用方必须持有 mutation_lock
    async fn verify_locked(&self, session: Session, now: Timestamp) -> Result<Session, SessionError> {
        if session.is_expired(now) {
            self.deps.cache.remove(&session.token).await;
            self.deps.durable.delete(&session.token).await?;
            info!(user_id = %session.user_id(), "expired session removed on lookup");
            return Err(SessionError::Expired);
        }
        if !session.is_valid(now) {
            return Err(SessionError::Invalid);
        }
        Ok(session)
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn parse_token(token: &str) -> Result<SessionToken, SessionError> {
    SessionToken::parse(token).map_err(|_| SessionError::Invalid)
}

async fn run_sweeper(
    store: std::sync::Weak<SessionStore>,
    cancel: CancellationToken,
    period: StdDuration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(period_secs = period.as_secs(), "session sweeper started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(store) = store.upgrade() else { break };
                let report = store.sweep().await;
                debug!(
                    cache_removed = report.cache_removed,
                    durable_removed = ?report.durable_removed,
                    "session sweep finished"
                );
            }
        }
    }
    debug!("session sweeper stopped");
}
