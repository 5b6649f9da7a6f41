//! HTTP API endpoint handlers (health, room list, conversation history).

use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use crate::{
    infrastructure::dto::api::{ConversationHistoryDto, HealthResponseDto, RoomSummaryDto},
    ui::{middleware::CallerIdentity, state::AppState},
};

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponseDto> {
    let status = if state.degraded { "degraded" } else { "ok" };
    Json(HealthResponseDto {
        status: status.to_string(),
        active_sessions: state.sessions.active_sessions().await.len(),
        rooms: state.list_rooms_usecase.execute().await.len(),
    })
}

/// Get list of rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.list_rooms_usecase.execute().await;

    // Domain Model から DTO への変換
    Json(rooms.into_iter().map(RoomSummaryDto::from).collect())
}

/// Get the caller's conversations with their messages
pub async fn get_conversation_history(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
) -> Json<Vec<ConversationHistoryDto>> {
    let conversations = state
        .list_conversations_usecase
        .execute(&identity.user_id)
        .await;

    Json(
        conversations
            .into_iter()
            .map(ConversationHistoryDto::from)
            .collect(),
    )
}
