use application::{pump_inbound, pump_outbound, ConnectionHandle, Frame};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::Identity;
use futures_util::{future, SinkExt, StreamExt};

use crate::state::AppState;

/// 驱动一个已升级的 WebSocket 连接直到断开
///
/// 连接先交给 Hub 准入，随后由两个任务分别负责读和写：
/// - 读任务把每个文本/二进制帧交给 Hub 广播，读失败或收到关闭帧时移除连接
/// - 写任务按顺序写出出站队列
///
/// Hub 移除或驱逐连接时触发关闭信号，两个任务立即结束，socket 随之被丢弃。
pub async fn serve(socket: WebSocket, state: AppState, identity: Option<Identity>) {
    let user_id = identity.as_ref().map(|identity| identity.user_id);
    let (handle, queue) = ConnectionHandle::open(identity, state.outbound_capacity);
    let id = handle.id();
    let closed = handle.closed();
    state.hub.admit(handle);
    tracing::info!(connection_id = %id, user_id = ?user_id, "websocket connection admitted");

    let (sender, receiver) = socket.split();
    let sink = sender.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let inbound = receiver
        .take_while(|message| future::ready(!matches!(message, Ok(WsMessage::Close(_)))))
        .filter_map(|message| future::ready(into_frame(message)));

    let mut send_task = tokio::spawn(pump_outbound(id, queue, sink, closed.clone()));
    let mut recv_task = {
        let hub = state.hub.clone();
        tokio::spawn(async move { pump_inbound(id, inbound, &hub, closed).await })
    };

    tokio::select! {
        _ = &mut recv_task => {
            // 读循环已移除连接，写循环随关闭信号结束
            if let Err(err) = send_task.await {
                tracing::warn!(connection_id = %id, error = %err, "websocket writer panicked");
            }
        }
        _ = &mut send_task => {
            recv_task.abort();
            state.hub.remove(id);
        }
    }

    tracing::info!(connection_id = %id, user_id = ?user_id, "websocket connection closed");
}

fn to_message(frame: Frame) -> WsMessage {
    match frame {
        Frame::Text(text) => WsMessage::Text(text.to_string().into()),
        Frame::Binary(bytes) => WsMessage::Binary(bytes.to_vec().into()),
    }
}

// Ping/Pong 由 axum 自动应答，不进入广播
fn into_frame(message: Result<WsMessage, axum::Error>) -> Option<Result<Frame, axum::Error>> {
    match message {
        Ok(WsMessage::Text(text)) => Some(Ok(Frame::text(text.as_str()))),
        Ok(WsMessage::Binary(bytes)) => Some(Ok(Frame::binary(bytes))),
        Ok(_) => None,
        Err(err) => Some(Err(err)),
    }
}
