//! Chat room handlers (join, post, stream).

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{
        Path, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use crate::{
    domain::{RoomId, UserId},
    infrastructure::dto::{
        api::{JoinRoomRequestDto, JoinRoomResponseDto, PostMessageRequestDto, PostMessageResponseDto},
        websocket::ChatEventDto,
    },
    ui::{error::ApiError, middleware::CallerIdentity, state::AppState},
};

use super::{resolve_user_id, send_json, spawn_disconnect_watcher, username_or_id};

pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<JoinRoomRequestDto>,
) -> Result<Json<JoinRoomResponseDto>, ApiError> {
    let room_id = RoomId::new(room_id)?;
    let user_id = resolve_user_id(&identity, body.user_id)?;
    let username = username_or_id(body.username, &user_id);

    let joined = state
        .join_room_usecase
        .execute(&room_id, user_id, username)
        .await;

    Ok(Json(JoinRoomResponseDto {
        success: true,
        message: joined.message,
    }))
}

pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<PostMessageRequestDto>,
) -> Result<Json<PostMessageResponseDto>, ApiError> {
    let room_id = RoomId::new(room_id)?;
    let user_id = resolve_user_id(&identity, body.user_id)?;
    let username = username_or_id(body.username, &user_id);

    let posted = state
        .post_chat_message_usecase
        .execute(&room_id, user_id, username, body.content)
        .await?;
    tracing::debug!(
        "Message {} posted to room '{}' (delivered: {}, dropped: {})",
        posted.message_id,
        room_id,
        posted.report.delivered,
        posted.report.dropped
    );

    Ok(Json(PostMessageResponseDto {
        success: true,
        message_id: posted.message_id,
    }))
}

/// Server push of room events. The welcome message is always the first frame.
pub async fn room_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let room_id = RoomId::new(room_id)?;
    let user_id = identity.user_id;
    Ok(ws.on_upgrade(move |socket| handle_room_stream(socket, state, room_id, user_id)))
}

async fn handle_room_stream(
    socket: WebSocket,
    state: Arc<AppState>,
    room_id: RoomId,
    user_id: UserId,
) {
    let (mut sender, receiver) = socket.split();
    let cancel = state.shutdown.child_token();
    let watcher = spawn_disconnect_watcher(receiver, cancel.clone(), state.idle_timeout);

    let mut subscription = state
        .subscribe_room_usecase
        .execute(&room_id, user_id.clone())
        .await;

    let welcome = ChatEventDto::from(subscription.welcome().clone());
    match send_json(&mut sender, &welcome).await {
        Err(e) => tracing::warn!("Failed to send welcome to '{}': {}", user_id, e),
        Ok(()) => loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = subscription.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("Subscription of '{}' in '{}' ended", user_id, room_id);
                        break;
                    };
                    if let Err(e) = send_json(&mut sender, &ChatEventDto::from(event)).await {
                        tracing::debug!("Failed to push event to '{}': {}", user_id, e);
                        break;
                    }
                }
            }
        },
    }

    subscription.close().await;
    cancel.cancel();
    if let Err(e) = watcher.await {
        tracing::warn!("Disconnect watcher task failed: {}", e);
    }
    if let Err(e) = sender.close().await {
        tracing::debug!("Failed to close room stream for '{}': {}", user_id, e);
    }
}
