//! 事件发射器
//!
//! 请求处理逻辑通过它把领域事件推送给在线连接，而不需要了解连接细节。
//! 进程级实例在 Hub 启动后安装；安装之前的调用全部静默忽略。

use domain::UserId;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, error};

use crate::connection::Frame;
use crate::hub::HubHandle;

/// 推送给客户端的事件信封：`{"type": ..., "data": ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub data: T,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn new(event_type: &'a str, data: T) -> Self {
        Self { event_type, data }
    }

    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::text)
    }
}

#[derive(Default)]
pub struct EventEmitter {
    hub: OnceCell<HubHandle>,
}

impl EventEmitter {
    pub const fn new() -> Self {
        Self {
            hub: OnceCell::new(),
        }
    }

    pub fn with_hub(hub: HubHandle) -> Self {
        let emitter = Self::new();
        emitter.install(hub);
        emitter
    }

    /// 只有第一次安装生效
    pub fn install(&self, hub: HubHandle) -> bool {
        self.hub.set(hub).is_ok()
    }

    pub fn is_installed(&self) -> bool {
        self.hub.get().is_some()
    }

    /// 广播给所有连接
    pub fn emit<T: Serialize>(&self, event_type: &str, data: T) {
        if let Some((hub, frame)) = self.prepare(event_type, data) {
            hub.broadcast(frame);
        }
    }

    /// 只发给绑定到该用户的连接
    pub fn emit_to_user<T: Serialize>(&self, user_id: UserId, event_type: &str, data: T) {
        if let Some((hub, frame)) = self.prepare(event_type, data) {
            hub.send_to_user(user_id, frame);
        }
    }

    /// 广播给除该用户以外的所有连接
    pub fn emit_except<T: Serialize>(&self, excluded: UserId, event_type: &str, data: T) {
        if let Some((hub, frame)) = self.prepare(event_type, data) {
            hub.broadcast_except(excluded, frame);
        }
    }

    fn prepare<T: Serialize>(&self, event_type: &str, data: T) -> Option<(&HubHandle, Frame)> {
        let Some(hub) = self.hub.get() else {
            debug!(event_type, "emitter not initialized, dropping event");
            return None;
        };
        match Envelope::new(event_type, data).to_frame() {
            Ok(frame) => Some((hub, frame)),
            Err(err) => {
                error!(event_type, error = %err, "failed to serialize event");
                None
            }
        }
    }
}

static GLOBAL_EMITTER: EventEmitter = EventEmitter::new();

/// 进程级发射器
pub fn global() -> &'static EventEmitter {
    &GLOBAL_EMITTER
}

/// 启动时调用一次，返回是否由本次调用完成安装
pub fn install_global(hub: HubHandle) -> bool {
    GLOBAL_EMITTER.install(hub)
}

pub fn emit<T: Serialize>(event_type: &str, data: T) {
    GLOBAL_EMITTER.emit(event_type, data);
}

pub fn emit_to_user<T: Serialize>(user_id: UserId, event_type: &str, data: T) {
    GLOBAL_EMITTER.emit_to_user(user_id, event_type, data);
}
