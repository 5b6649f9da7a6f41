//! AI conversation handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

use crate::{
    domain::{ChatEvent, ConversationRequest, Language, SUBSCRIBER_QUEUE_CAPACITY, SessionId, UserId},
    infrastructure::dto::{
        api::{
            ConversationRequestDto, ConversationResponseDto, EndConversationRequestDto,
            EndConversationResponseDto, ErrorResponseDto, StartConversationRequestDto,
            StartConversationResponseDto,
        },
        websocket::ChatEventDto,
    },
    ui::{error::ApiError, middleware::CallerIdentity, state::AppState},
    usecase::EventStreamOutcome,
};

use super::{
    close_with_error, next_message, pusher_loop, resolve_user_id, send_json,
    spawn_disconnect_watcher, username_or_id,
};

/// 言語が指定されなかった場合の既定値
pub const DEFAULT_LANGUAGE: &str = "ja";

pub async fn start_conversation(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<StartConversationRequestDto>,
) -> Result<Json<StartConversationResponseDto>, ApiError> {
    let user_id = resolve_user_id(&identity, body.user_id)?;
    let username = username_or_id(body.username, &user_id);
    let language = Language::new(body.language)?;

    let session_id = state
        .start_conversation_usecase
        .execute(&user_id, &username, &language)
        .await?;

    Ok(Json(StartConversationResponseDto {
        session_id: session_id.into_string(),
        success: true,
        error_message: String::new(),
    }))
}

pub async fn end_conversation(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<EndConversationRequestDto>,
) -> Result<Json<EndConversationResponseDto>, ApiError> {
    let session_id = SessionId::new(body.session_id)?;
    let user_id = resolve_user_id(&identity, body.user_id)?;

    state
        .end_conversation_usecase
        .execute(&session_id, &user_id)
        .await?;

    Ok(Json(EndConversationResponseDto {
        success: true,
        error_message: String::new(),
    }))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<ConversationRequestDto>,
) -> Result<Json<ConversationResponseDto>, ApiError> {
    let response = respond(&state, &identity, body).await?;
    Ok(Json(response))
}

/// Bind the request to the caller identity, translate, and run one request/response exchange
async fn respond(
    state: &AppState,
    identity: &CallerIdentity,
    mut body: ConversationRequestDto,
) -> Result<ConversationResponseDto, ApiError> {
    body.user_id = resolve_user_id(identity, body.user_id)?.into_string();
    let request = ConversationRequest::try_from(body)?;
    let response = state
        .send_conversation_message_usecase
        .execute(&request)
        .await?;
    Ok(response.into())
}

/// Bidirectional conversation over WebSocket.
///
/// Each text frame is a JSON [`ConversationRequestDto`]; each reply is a JSON
/// [`ConversationResponseDto`] or, on failure, an [`ErrorResponseDto`].
pub async fn conversation_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_conversation_stream(socket, state, identity))
}

async fn handle_conversation_stream(
    socket: WebSocket,
    state: Arc<AppState>,
    identity: CallerIdentity,
) {
    let (mut sender, mut receiver) = socket.split();
    let cancel = state.shutdown.child_token();
    tracing::info!("Conversation stream opened for '{}'", identity.user_id);

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            next = next_message(&mut receiver, state.idle_timeout) => match next {
                Some(message) => message,
                None => break,
            },
        };
        let Message::Text(text) = message else {
            continue;
        };

        let result = match serde_json::from_str::<ConversationRequestDto>(text.as_str()) {
            Ok(body) => respond(&state, &identity, body).await,
            Err(e) => Err(ApiError::BadRequest(format!("invalid request: {}", e))),
        };
        let sent = match result {
            Ok(response) => send_json(&mut sender, &response).await,
            Err(e) => {
                tracing::debug!("Conversation stream request failed: {}", e.message());
                let error = ErrorResponseDto {
                    error: e.message().to_string(),
                };
                send_json(&mut sender, &error).await
            }
        };
        if let Err(e) = sent {
            tracing::debug!("Failed to reply to '{}': {}", identity.user_id, e);
            break;
        }
    }

    tracing::info!("Conversation stream closed for '{}'", identity.user_id);
    if let Err(e) = sender.close().await {
        tracing::debug!("Failed to close conversation stream: {}", e);
    }
}

/// Query parameters for the conversation event stream
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Server push of conversation lifecycle events.
///
/// Starts a conversation on connect and ends it when the client disconnects or the server stops.
pub async fn conversation_events_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = identity.user_id;
    let username = username_or_id(query.username.unwrap_or_default(), &user_id);
    let language = Language::new(
        query
            .language
            .filter(|language| !language.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
    )?;

    Ok(ws.on_upgrade(move |socket| {
        handle_conversation_events(socket, state, user_id, username, language)
    }))
}

async fn handle_conversation_events(
    socket: WebSocket,
    state: Arc<AppState>,
    user_id: UserId,
    username: String,
    language: Language,
) {
    let (sender, receiver) = socket.split();
    let cancel = state.shutdown.child_token();
    let watcher = spawn_disconnect_watcher(receiver, cancel.clone(), state.idle_timeout);

    let (tx, rx) = mpsc::channel::<ChatEvent>(SUBSCRIBER_QUEUE_CAPACITY);
    let pusher = pusher_loop(rx, sender, |event| {
        match serde_json::to_string(&ChatEventDto::from(event)) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::warn!("Failed to encode conversation event: {}", e);
                None
            }
        }
    });

    let result = state
        .stream_conversation_events_usecase
        .execute(
            user_id.clone(),
            username,
            language,
            PollSender::new(tx),
            cancel.clone(),
        )
        .await;

    cancel.cancel();
    if let Err(e) = watcher.await {
        tracing::warn!("Disconnect watcher task failed: {}", e);
    }
    let mut sender = match pusher.await {
        Ok(sender) => sender,
        Err(e) => {
            tracing::warn!("Event pusher task failed: {}", e);
            return;
        }
    };

    match result {
        Ok(EventStreamOutcome::Cancelled) => {
            tracing::info!("Conversation event stream for '{}' ended", user_id);
            if let Err(e) = sender.close().await {
                tracing::debug!("Failed to close event stream: {}", e);
            }
        }
        Ok(EventStreamOutcome::ClientWriteFailed(e)) => {
            tracing::info!("Conversation event stream for '{}' lost: {}", user_id, e);
        }
        Err(e) => {
            tracing::warn!("Failed to start conversation for '{}': {}", user_id, e);
            close_with_error(sender, ApiError::from(e).message().to_string()).await;
        }
    }
}
