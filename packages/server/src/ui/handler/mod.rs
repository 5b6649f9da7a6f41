//! HTTP / WebSocket handlers and the helpers they share.

mod chat;
mod conversation;
mod http;
mod websocket;

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{domain::UserId, ui::error::ApiError, ui::middleware::CallerIdentity};

pub use chat::{join_room, post_message, room_stream_handler};
pub use conversation::{
    conversation_events_handler, conversation_stream_handler, end_conversation, send_message,
    start_conversation,
};
pub use http::{get_conversation_history, get_rooms, health_check};
pub use websocket::audio_bridge_handler;

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

/// リクエストボディの user_id。空なら認証済みの呼び出し元で埋め、呼び出し元と異なれば 403
fn resolve_user_id(identity: &CallerIdentity, body_user_id: String) -> Result<UserId, ApiError> {
    if body_user_id.is_empty() || body_user_id == identity.user_id.as_str() {
        return Ok(identity.user_id.clone());
    }
    Err(ApiError::Forbidden(format!(
        "user_id '{}' does not match the authenticated user",
        body_user_id
    )))
}

/// 空の username は user_id で代用する
fn username_or_id(username: String, user_id: &UserId) -> String {
    if username.is_empty() {
        user_id.as_str().to_string()
    } else {
        username
    }
}

/// Serialize `value` as JSON and send it as a text frame
async fn send_json<T: Serialize>(sender: &mut WsSender, value: &T) -> Result<(), String> {
    let json = serde_json::to_string(value).map_err(|e| e.to_string())?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Send a close frame carrying `reason` and close the sink
async fn close_with_error(mut sender: WsSender, reason: String) {
    let frame = CloseFrame {
        code: close_code::ERROR,
        reason: reason.into(),
    };
    if let Err(e) = sender.send(Message::Close(Some(frame))).await {
        tracing::debug!("Failed to send close frame: {}", e);
    }
}

/// Next client frame, or `None` when the client is gone or idle for `idle_timeout`
async fn next_message(receiver: &mut WsReceiver, idle_timeout: Option<Duration>) -> Option<Message> {
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, receiver.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::info!("Closing idle connection after {:?}", limit);
                return None;
            }
        },
        None => receiver.next().await,
    };
    match next {
        Some(Ok(Message::Close(_))) | None => None,
        Some(Ok(message)) => Some(message),
        Some(Err(e)) => {
            tracing::warn!("WebSocket error: {}", e);
            None
        }
    }
}

/// Watch a push-only connection; cancel `cancel` once the client disconnects or goes idle.
///
/// Inbound frames other than close are ignored.
fn spawn_disconnect_watcher(
    mut receiver: WsReceiver,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                next = next_message(&mut receiver, idle_timeout) => {
                    if next.is_none() {
                        break;
                    }
                }
            }
        }
        cancel.cancel();
    })
}

/// Spawns a task that receives items from the rx channel and pushes them to the WebSocket sender.
///
/// Items that `encode` rejects are skipped. The task ends when the channel closes or a write
/// fails, and hands the sender back so the caller can still send a close frame.
fn pusher_loop<T, F>(mut rx: mpsc::Receiver<T>, mut sender: WsSender, encode: F) -> JoinHandle<WsSender>
where
    T: Send + 'static,
    F: Fn(T) -> Option<Message> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let Some(message) = encode(item) else {
                continue;
            };
            if let Err(e) = sender.send(message).await {
                tracing::debug!("Failed to push to client: {}", e);
                break;
            }
        }
        sender
    })
}
