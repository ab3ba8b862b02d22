//! 连接中心
//!
//! `ConnectionRegistry` 保存全部在线连接以及 用户 -> 连接 的索引；
//! `Hub` 是唯一持有它的任务，所有准入、移除和投递请求都经由
//! `HubHandle` 发送到同一个命令队列中顺序执行。

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use domain::{ConnectionId, UserId};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionError, ConnectionHandle, Frame};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub identities: usize,
}

/// 一次投递的结果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub evicted: Vec<ConnectionId>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    by_user: HashMap<UserId, Vec<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重复准入同一个连接 ID 不做任何事
    pub fn admit(&mut self, handle: ConnectionHandle) {
        let id = handle.id();
        let Entry::Vacant(slot) = self.connections.entry(id) else {
            return;
        };
        if let Some(identity) = handle.identity() {
            self.by_user.entry(identity.user_id).or_default().push(id);
            debug!(connection_id = %id, user_id = %identity.user_id, "connection admitted");
        } else {
            debug!(connection_id = %id, "anonymous connection admitted");
        }
        slot.insert(handle);
    }

    /// 返回连接是否存在。被移除的连接先收到关闭信号，句柄随后在这里丢弃，
    /// 出站队列随之关闭。
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let Some(handle) = self.connections.remove(&id) else {
            return false;
        };
        handle.close();
        if let Some(identity) = handle.identity() {
            if let Entry::Occupied(mut bucket) = self.by_user.entry(identity.user_id) {
                bucket.get_mut().retain(|existing| *existing != id);
                if bucket.get().is_empty() {
                    bucket.remove();
                }
            }
        }
        debug!(connection_id = %id, "connection removed");
        true
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn connections_for(&self, user_id: UserId) -> &[ConnectionId] {
        self.by_user.get(&user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn broadcast(&mut self, frame: &Frame) -> DeliveryReport {
        let targets: Vec<ConnectionId> = self.connections.keys().copied().collect();
        self.deliver(targets, frame)
    }

    /// 该用户没有连接时什么也不做
    pub fn send_to_user(&mut self, user_id: UserId, frame: &Frame) -> DeliveryReport {
        let targets = self.connections_for(user_id).to_vec();
        self.deliver(targets, frame)
    }

    pub fn broadcast_except(&mut self, excluded: UserId, frame: &Frame) -> DeliveryReport {
        let targets: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|handle| handle.identity().map(|i| i.user_id) != Some(excluded))
            .map(ConnectionHandle::id)
            .collect();
        self.deliver(targets, frame)
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            identities: self.by_user.len(),
        }
    }

    // 先投递再统一驱逐，遍历过程中不修改索引
    fn deliver(&mut self, targets: Vec<ConnectionId>, frame: &Frame) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for id in targets {
            let Some(handle) = self.connections.get(&id) else {
                continue;
            };
            match handle.try_deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(ConnectionError::QueueSaturated) => {
                    warn!(connection_id = %id, "outbound queue saturated, evicting connection");
                    report.evicted.push(id);
                }
                Err(err) => {
                    debug!(connection_id = %id, error = %err, "evicting unreachable connection");
                    report.evicted.push(id);
                }
            }
        }
        for id in &report.evicted {
            self.remove(*id);
        }
        report
    }
}

enum HubCommand {
    Admit(ConnectionHandle),
    Remove(ConnectionId),
    Broadcast(Frame),
    SendToUser(UserId, Frame),
    BroadcastExcept(UserId, Frame),
    Stats(oneshot::Sender<HubStats>),
}

/// 持有注册表的任务
pub struct Hub {
    registry: ConnectionRegistry,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let hub = Self {
            registry: ConnectionRegistry::new(),
            commands,
        };
        (hub, HubHandle { commands: sender })
    }

    pub fn spawn() -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new();
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// 所有句柄都被丢弃后结束
    pub async fn run(mut self) {
        info!("hub started");
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        info!(
            remaining = self.registry.stats().connections,
            "hub stopped"
        );
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Admit(handle) => self.registry.admit(handle),
            HubCommand::Remove(id) => {
                self.registry.remove(id);
            }
            HubCommand::Broadcast(frame) => {
                self.registry.broadcast(&frame);
            }
            HubCommand::SendToUser(user_id, frame) => {
                self.registry.send_to_user(user_id, &frame);
            }
            HubCommand::BroadcastExcept(user_id, frame) => {
                self.registry.broadcast_except(user_id, &frame);
            }
            HubCommand::Stats(reply) => {
                let _ = reply.send(self.registry.stats());
            }
        }
    }
}

/// 向 Hub 提交请求的句柄。提交不会阻塞，Hub 已停止时请求被丢弃。
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    pub fn admit(&self, handle: ConnectionHandle) {
        self.submit(HubCommand::Admit(handle));
    }

    pub fn remove(&self, id: ConnectionId) {
        self.submit(HubCommand::Remove(id));
    }

    pub fn broadcast(&self, frame: Frame) {
        self.submit(HubCommand::Broadcast(frame));
    }

    pub fn send_to_user(&self, user_id: UserId, frame: Frame) {
        self.submit(HubCommand::SendToUser(user_id, frame));
    }

    pub fn broadcast_except(&self, excluded: UserId, frame: Frame) {
        self.submit(HubCommand::BroadcastExcept(excluded, frame));
    }

    pub async fn stats(&self) -> Option<HubStats> {
        let (reply, response) = oneshot::channel();
        self.submit(HubCommand::Stats(reply));
        response.await.ok()
    }

    fn submit(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            debug!("hub is not running, dropping command");
        }
    }
}
