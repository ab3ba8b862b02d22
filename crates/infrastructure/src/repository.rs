use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    DurableTier, Identity, RepositoryError, RepositoryResult, Session, SessionToken, Timestamp,
    UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::debug;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepositoryError::Conflict;
        }
        // 会话引用了不存在的用户，会话存储将其视为非法身份
        if db.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::storage(err.to_string())
}

#[derive(Debug, FromRow)]
struct SessionRecord {
    session_id: String,
    user_id: i64,
    username: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRecord> for Session {
    type Error = RepositoryError;

    fn try_from(value: SessionRecord) -> Result<Self, Self::Error> {
        let token = SessionToken::parse(value.session_id)
            .map_err(|err| RepositoryError::storage(err.to_string()))?;
        Ok(Session {
            token,
            identity: Identity::new(value.user_id, value.username),
            created_at: value.created_at,
            expires_at: value.expires_at,
        })
    }
}

/// `sessions` 表上的持久层，用户名通过关联 `users` 表取得
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableTier for PgSessionRepository {
    async fn insert(&self, session: &Session) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.token.as_str())
        .bind(i64::from(session.user_id()))
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn find_valid(
        &self,
        token: &SessionToken,
        now: Timestamp,
    ) -> RepositoryResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT s.session_id, s.user_id, u.username, s.created_at, s.expires_at
            FROM sessions s
            JOIN users u ON u.user_id = s.user_id
            WHERE s.session_id = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Session::try_from).transpose()
    }

    async fn delete(&self, token: &SessionToken) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(token.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: UserId) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(i64::from(user_id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: Timestamp) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        debug!(removed = result.rows_affected(), "expired sessions deleted");
        Ok(result.rows_affected())
    }

    async fn update_expiry(
        &self,
        token: &SessionToken,
        expires_at: Timestamp,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query("UPDATE sessions SET expires_at = $2 WHERE session_id = $1")
            .bind(token.as_str())
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
