use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use domain::{Session, SessionError, UserId};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use application::{ApplicationError, HubStats};

use crate::{error::ApiError, state::AppState, ws_connection};

#[derive(Debug, Deserialize)]
struct TypingPayload {
    to_user_id: i64,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    success: bool,
    user_id: UserId,
    username: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            success: true,
            user_id: session.identity.user_id,
            username: session.identity.username,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(current_session))
        .route("/session/refresh", post(refresh_session))
        .route("/logout", post(logout))
        .route("/typing/start", post(typing_start))
        .route("/typing/stop", post(typing_stop))
}

async fn health(State(state): State<AppState>) -> Result<Json<HubStats>, ApiError> {
    state
        .hub
        .stats()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::service_unavailable("hub is not running"))
}

/// 有有效会话时绑定身份，否则以匿名连接准入
async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Response {
    let identity = match state.cookies.token(&jar) {
        Some(token) => match state.sessions.resolve(token).await {
            Ok(identity) => Some(identity),
            Err(err) => {
                tracing::debug!(error = %err, "websocket session rejected, admitting anonymously");
                None
            }
        },
        None => None,
    };

    ws.on_upgrade(move |socket| ws_connection::serve(socket, state, identity))
}

async fn require_session(state: &AppState, jar: &CookieJar) -> Result<Session, ApiError> {
    let token = state.cookies.token(jar).ok_or(SessionError::NotFound)?;
    Ok(state.sessions.lookup(token).await?)
}

async fn current_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = require_session(&state, &jar).await?;
    Ok(Json(session.into()))
}

async fn refresh_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let token = state.cookies.token(&jar).ok_or(SessionError::NotFound)?;
    let session = state.sessions.refresh(token).await?;
    let jar = state.cookies.issue(jar, &session);
    Ok((jar, Json(session.into())))
}

/// 登出总是成功：会话存在时广播离线状态，随后删除并让 Cookie 过期
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SuccessResponse>), ApiError> {
    if let Some(token) = state.cookies.token(&jar) {
        if let Ok(identity) = state.sessions.resolve(token).await {
            state.emitter.user_online_status(&identity, false);
            tracing::info!(user_id = %identity.user_id, "user logged out");
        }
        state.sessions.delete(token).await?;
    }
    let jar = state.cookies.expire(jar);
    Ok((jar, Json(SuccessResponse { success: true })))
}

async fn typing_start(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<TypingPayload>,
) -> Result<Json<SuccessResponse>, ApiError> {
    typing(&state, &jar, payload, true).await
}

async fn typing_stop(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<TypingPayload>,
) -> Result<Json<SuccessResponse>, ApiError> {
    typing(&state, &jar, payload, false).await
}

async fn typing(
    state: &AppState,
    jar: &CookieJar,
    payload: TypingPayload,
    is_typing: bool,
) -> Result<Json<SuccessResponse>, ApiError> {
    let session = require_session(state, jar).await?;
    let to = UserId(payload.to_user_id);
    if !to.is_positive() {
        return Err(ApplicationError::invalid_argument("to_user_id", "must be positive").into());
    }
    state.emitter.user_typing(&session.identity, to, is_typing);
    Ok(Json(SuccessResponse { success: true }))
}
