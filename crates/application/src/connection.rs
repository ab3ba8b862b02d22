//! 单个双向连接
//!
//! 连接由 Hub 独占持有。传输层的读写循环只拿到发送队列的接收端、连接 ID
//! 和关闭信号。Hub 移除或驱逐连接时先触发关闭信号再丢弃发送端，
//! 两个循环都会立即退出，不再写出剩余帧，也不再广播对端发来的帧。

use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use domain::{ConnectionId, Identity};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::hub::HubHandle;

/// 已序列化、待写出的帧。克隆只增加引用计数，广播时不复制内容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

impl Frame {
    pub fn text(text: impl AsRef<str>) -> Self {
        Self::Text(Arc::from(text.as_ref()))
    }

    pub fn binary(bytes: impl AsRef<[u8]>) -> Self {
        Self::Binary(Arc::from(bytes.as_ref()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("transport failure: {0}")]
    Transport(String),
    /// 出站队列已满，连接将被驱逐
    #[error("outbound queue saturated")]
    QueueSaturated,
    /// 出站队列的接收端已经不存在
    #[error("outbound queue closed")]
    QueueClosed,
}

impl ConnectionError {
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Hub 持有的连接记录。不可克隆：发送端只有一份，丢弃即关闭队列。
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    identity: Option<Identity>,
    outbound: mpsc::Sender<Frame>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// 创建连接及其有界出站队列，返回的接收端交给出站循环
    pub fn open(identity: Option<Identity>, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (outbound, queue) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            identity,
            outbound,
            closed: CancellationToken::new(),
        };
        (handle, queue)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// 连接的关闭信号，交给读写循环；Hub 移除连接时触发
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub(crate) fn close(&self) {
        self.closed.cancel();
    }

    /// 非阻塞投递
    pub fn try_deliver(&self, frame: Frame) -> Result<(), ConnectionError> {
        self.outbound.try_send(frame).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ConnectionError::QueueSaturated,
            mpsc::error::TrySendError::Closed(_) => ConnectionError::QueueClosed,
        })
    }
}

/// 出站循环：按入队顺序写出。队列关闭并排空后关闭传输；
/// 收到关闭信号时立即返回，阻塞中的写入一并放弃，由调用方丢弃传输。
pub async fn pump_outbound<S>(
    id: ConnectionId,
    mut queue: mpsc::Receiver<Frame>,
    sink: S,
    closed: CancellationToken,
) -> Result<(), ConnectionError>
where
    S: Sink<Frame>,
    S::Error: fmt::Display,
{
    let mut sink = pin!(sink);
    loop {
        let frame = tokio::select! {
            biased;
            _ = closed.cancelled() => return stopped(id),
            frame = queue.recv() => frame,
        };
        let Some(frame) = frame else { break };
        tokio::select! {
            biased;
            _ = closed.cancelled() => return stopped(id),
            result = sink.send(frame) => {
                if let Err(err) = result {
                    warn!(connection_id = %id, error = %err, "failed to write frame");
                    return Err(ConnectionError::transport(err));
                }
            }
        }
    }
    debug!(connection_id = %id, "outbound queue closed");
    sink.close().await.map_err(ConnectionError::transport)
}

fn stopped(id: ConnectionId) -> Result<(), ConnectionError> {
    debug!(connection_id = %id, "connection closed by hub, writer stopped");
    Ok(())
}

/// 入站循环：每个入站帧都交给 Hub 广播；读失败、对端关闭或收到关闭信号时
/// 从 Hub 移除该连接
pub async fn pump_inbound<St, E>(
    id: ConnectionId,
    stream: St,
    hub: &HubHandle,
    closed: CancellationToken,
) -> Result<(), ConnectionError>
where
    St: Stream<Item = Result<Frame, E>>,
    E: fmt::Display,
{
    let mut stream = pin!(stream);
    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = closed.cancelled() => {
                debug!(connection_id = %id, "connection closed by hub, reader stopped");
                break Ok(());
            }
            next = stream.next() => next,
        };
        match next {
            Some(Ok(frame)) => hub.broadcast(frame),
            Some(Err(err)) => {
                warn!(connection_id = %id, error = %err, "transport read failed");
                break Err(ConnectionError::transport(err));
            }
            None => break Ok(()),
        }
    };
    hub.remove(id);
    outcome
}
