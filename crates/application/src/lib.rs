//! 应用层实现。
//!
//! 实时推送的并发核心：两级会话存储、连接及其读写循环、
//! 串行化所有连接操作的 Hub，以及供请求处理逻辑使用的事件发射器。

pub mod clock;
pub mod connection;
pub mod emitter;
pub mod error;
pub mod events;
pub mod hub;
pub mod services;
pub mod session_tiers;

pub use clock::{Clock, FixedClock, SystemClock};
pub use connection::{pump_inbound, pump_outbound, ConnectionError, ConnectionHandle, Frame};
pub use emitter::{Envelope, EventEmitter};
pub use error::ApplicationError;
pub use events::{OnlineStatus, TypingIndicator};
pub use hub::{ConnectionRegistry, DeliveryReport, Hub, HubHandle, HubStats};
pub use services::{SessionSettings, SessionStore, SessionStoreDependencies, SweepReport};
pub use session_tiers::InMemoryCacheTier;
