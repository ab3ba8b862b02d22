mod session_store;

pub use session_store::{
    SessionSettings, SessionStore, SessionStoreDependencies, SweepReport,
};
