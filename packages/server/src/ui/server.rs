//! Server execution logic.

use std::{future::Future, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::Request,
    http::HeaderName,
    middleware,
    routing::{get, post},
};
use tokio::{net::TcpListener, task::JoinHandle, time::Instant};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::usecase::EvictIdleRoomsUseCase;

use super::{
    handler::{
        audio_bridge_handler, conversation_events_handler, conversation_stream_handler,
        end_conversation, get_conversation_history, get_rooms, health_check, join_room,
        post_message, room_stream_handler, send_message, start_conversation,
    },
    middleware::require_identity,
    signal::shutdown_signal,
    state::AppState,
};

/// リクエスト ID のヘッダー名
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Hanashi gateway server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(state, evict_idle_rooms_usecase, Duration::from_secs(60));
/// server.run("127.0.0.1".to_string(), 8000).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    /// EvictIdleRoomsUseCase（アイドル Room 削除のユースケース）
    evict_idle_rooms_usecase: Arc<EvictIdleRoomsUseCase>,
    /// アイドル Room を掃除する間隔
    sweep_interval: Duration,
}

impl Server {
    pub fn new(
        state: AppState,
        evict_idle_rooms_usecase: Arc<EvictIdleRoomsUseCase>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            state: Arc::new(state),
            evict_idle_rooms_usecase,
            sweep_interval,
        }
    }

    /// Build the router. `/api/health` is public, every other route requires an identity.
    pub fn router(&self) -> Router {
        let state = self.state.clone();

        let protected = Router::new()
            // 会話 API
            .route("/api/conversation/start", post(start_conversation))
            .route("/api/conversation/end", post(end_conversation))
            .route("/api/conversation/message", post(send_message))
            .route("/api/conversation/history", get(get_conversation_history))
            .route("/api/conversation/stream", get(conversation_stream_handler))
            .route("/api/conversation/events", get(conversation_events_handler))
            // チャットルーム API
            .route("/api/chat/rooms", get(get_rooms))
            .route("/api/chat/rooms/{room_id}/join", post(join_room))
            .route("/api/chat/rooms/{room_id}/messages", post(post_message))
            .route("/api/chat/rooms/{room_id}/stream", get(room_stream_handler))
            // 音声ブリッジ
            .route("/ws/chat", get(audio_bridge_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_identity,
            ));

        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
        Router::new()
            .route("/api/health", get(health_check))
            .merge(protected)
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
            .with_state(state)
    }

    /// Run the server until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Hanashi gateway listening on {}", listener.local_addr()?);
        if self.state.degraded {
            tracing::warn!("Running in degraded mode: AI service is not configured");
        }
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// When `shutdown` resolves, the server-wide cancellation token is cancelled so that
    /// open WebSocket connections end as well.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let sweeper = self.spawn_room_sweeper();

        let token = self.state.shutdown.clone();
        let signal = async move {
            shutdown.await;
            token.cancel();
        };

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await;

        self.state.shutdown.cancel();
        if let Err(e) = sweeper.await {
            tracing::warn!("Room sweeper task failed: {}", e);
        }
        tracing::info!("Server shutdown complete");
        result
    }

    fn spawn_room_sweeper(&self) -> JoinHandle<()> {
        let usecase = self.evict_idle_rooms_usecase.clone();
        let cancel = self.state.shutdown.clone();
        let period = self.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        usecase.execute().await;
                    }
                }
            }
        })
    }
}
