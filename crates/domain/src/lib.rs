//! 实时推送核心的领域模型
//!
//! 包含身份、会话、连接标识等值对象，会话有效性规则，
//! 错误分类以及会话两级存储（缓存层、持久层）的抽象接口。

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use value_objects::*;
