use std::sync::Arc;

use application::{EventEmitter, HubHandle, SessionStore};

use crate::cookie::CookieSettings;

#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub sessions: Arc<SessionStore>,
    /// 进程级事件发射器，生产环境中为 `application::emitter::global()`
    pub emitter: &'static EventEmitter,
    pub cookies: CookieSettings,
    /// 每个连接出站队列的容量
    pub outbound_capacity: usize,
}

impl AppState {
    pub fn new(
        hub: HubHandle,
        sessions: Arc<SessionStore>,
        emitter: &'static EventEmitter,
        cookies: CookieSettings,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            hub,
            sessions,
            emitter,
            cookies,
            outbound_capacity,
        }
    }
}
