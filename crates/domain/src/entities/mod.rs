//! 领域实体

pub mod session;

pub use session::*;
