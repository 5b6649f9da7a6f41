//! Dependency wiring.
//!
//! Initialize dependencies in order:
//! 1. Repositories
//! 2. Responder / UpstreamConnector (remote or fallback, chosen once here)
//! 3. UseCases
//! 4. AppState
//! 5. Server

use std::sync::Arc;

use hanashi_shared::time::Clock;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{AppConfig, InferenceBackend},
    domain::{Responder, UpstreamConnector, UpstreamError},
    infrastructure::{
        repository::{
            InMemoryConversationRepository, InMemoryRoomRepository, InMemorySessionRepository,
        },
        responder::{FallbackResponder, RemoteResponder},
        upstream::{UnavailableUpstreamConnector, WebSocketUpstreamConnector},
    },
    ui::{
        Server,
        middleware::{Authenticator, TokenVerifier},
        state::AppState,
    },
    usecase::{
        BridgeAudioStreamUseCase, EndConversationUseCase, EvictIdleRoomsUseCase, JoinRoomUseCase,
        ListConversationsUseCase, ListRoomsUseCase, PostChatMessageUseCase,
        SendConversationMessageUseCase, StartConversationUseCase,
        StreamConversationEventsUseCase, SubscribeRoomUseCase,
    },
};

/// Build the server described by `config`
///
/// # Errors
///
/// Returns an error if the HTTP client for the inference service cannot be built.
pub fn build_server(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Server, UpstreamError> {
    // 1. Repositories (in-memory)
    let rooms = Arc::new(InMemoryRoomRepository::new());
    let sessions = Arc::new(InMemorySessionRepository::new());
    let conversations = Arc::new(InMemoryConversationRepository::new());

    // 2. Inference backend
    let (responder, connector): (Arc<dyn Responder>, Arc<dyn UpstreamConnector>) =
        match &config.backend {
            InferenceBackend::Remote {
                base_url,
                stream_url,
            } => {
                tracing::info!("AI service: {} (stream: {})", base_url, stream_url);
                (
                    Arc::new(RemoteResponder::new(base_url.clone(), clock.clone())?),
                    Arc::new(WebSocketUpstreamConnector::new(stream_url.clone())),
                )
            }
            InferenceBackend::Fallback => {
                tracing::warn!("AI service not configured, using fallback responses");
                (
                    Arc::new(FallbackResponder::new(clock.clone())),
                    Arc::new(UnavailableUpstreamConnector),
                )
            }
        };

    // 3. UseCases
    let start_conversation_usecase = Arc::new(StartConversationUseCase::new(
        responder.clone(),
        sessions.clone(),
        conversations.clone(),
        clock.clone(),
    ));
    let end_conversation_usecase = Arc::new(EndConversationUseCase::new(
        responder.clone(),
        sessions.clone(),
        conversations.clone(),
        clock.clone(),
    ));
    let stream_conversation_events_usecase = Arc::new(StreamConversationEventsUseCase::new(
        start_conversation_usecase.clone(),
        end_conversation_usecase.clone(),
        clock.clone(),
    ));
    let evict_idle_rooms_usecase = Arc::new(EvictIdleRoomsUseCase::new(
        rooms.clone(),
        clock.clone(),
        config.room_idle,
    ));

    let authenticator = Authenticator::new(config.jwt_secret.as_deref().map(TokenVerifier::new));
    if config.jwt_secret.is_none() {
        tracing::warn!("JWT secret not set: only the X-User-ID header is accepted");
    }

    // 4. AppState
    let state = AppState {
        authenticator,
        sessions,
        shutdown: CancellationToken::new(),
        degraded: config.is_degraded(),
        idle_timeout: config.idle_timeout,
        join_room_usecase: Arc::new(JoinRoomUseCase::new(rooms.clone(), clock.clone())),
        post_chat_message_usecase: Arc::new(PostChatMessageUseCase::new(
            rooms.clone(),
            clock.clone(),
        )),
        subscribe_room_usecase: Arc::new(SubscribeRoomUseCase::new(rooms.clone(), clock.clone())),
        list_rooms_usecase: Arc::new(ListRoomsUseCase::new(rooms)),
        start_conversation_usecase,
        end_conversation_usecase,
        send_conversation_message_usecase: Arc::new(SendConversationMessageUseCase::new(
            responder,
            conversations.clone(),
            clock,
        )),
        list_conversations_usecase: Arc::new(ListConversationsUseCase::new(conversations)),
        stream_conversation_events_usecase,
        bridge_audio_stream_usecase: Arc::new(BridgeAudioStreamUseCase::new(
            connector,
            config.idle_timeout,
        )),
    };

    // 5. Server
    Ok(Server::new(
        state,
        evict_idle_rooms_usecase,
        config.room_sweep_interval,
    ))
}
