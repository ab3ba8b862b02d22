//! 推送给客户端的领域事件名称与负载

use domain::{Identity, UserId};
use serde::{Deserialize, Serialize};

use crate::emitter::EventEmitter;

pub const USER_REGISTERED: &str = "user_registered";
pub const USER_ONLINE_STATUS: &str = "user_online_status";
pub const USER_TYPING: &str = "user_typing";
pub const POST_CREATED: &str = "post.created";
pub const POST_REACTION: &str = "post.reaction";
pub const COMMENT_CREATED: &str = "comment.created";
pub const NEW_PRIVATE_MESSAGE: &str = "new_private_message";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineStatus {
    pub user_id: UserId,
    pub username: String,
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingIndicator {
    pub from_user_id: UserId,
    pub username: String,
    pub is_typing: bool,
}

impl EventEmitter {
    /// 登录、登出时广播在线状态
    pub fn user_online_status(&self, identity: &Identity, is_online: bool) {
        self.emit(
            USER_ONLINE_STATUS,
            OnlineStatus {
                user_id: identity.user_id,
                username: identity.username.clone(),
                is_online,
            },
        );
    }

    /// 只通知对话的另一方
    pub fn user_typing(&self, from: &Identity, to: UserId, is_typing: bool) {
        self.emit_to_user(
            to,
            USER_TYPING,
            TypingIndicator {
                from_user_id: from.user_id,
                username: from.username.clone(),
                is_typing,
            },
        );
    }
}
