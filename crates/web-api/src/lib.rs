//! Web API 层。
//!
//! 提供 Axum 路由：WebSocket 升级（连接准入）、会话相关接口以及会话 Cookie 的下发。

mod cookie;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use cookie::CookieSettings;
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
