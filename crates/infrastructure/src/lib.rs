//! 基础设施层实现。
//!
//! 提供会话持久层的 Postgres 适配器、连接池创建以及数据库迁移。

pub mod migrations;
pub mod repository;

pub use migrations::MIGRATOR;
pub use repository::{create_pg_pool, PgSessionRepository};
