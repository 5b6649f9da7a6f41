//! UseCase: チャットルームへのメッセージ投稿

use std::sync::Arc;

use hanashi_shared::time::{Clock, nanos_id};

use crate::domain::{BroadcastReport, ChatEvent, ChatMessage, RoomId, RoomRepository, UserId};

use super::error::PostChatMessageError;

/// 投稿結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub message_id: String,
    pub report: BroadcastReport,
}

/// メッセージ投稿のユースケース
///
/// 投稿者本人を含む、その時点の購読者全員に配信します。購読前に投稿されたメッセージは後から購読した人には届きません。
pub struct PostChatMessageUseCase {
    rooms: Arc<dyn RoomRepository>,
    clock: Arc<dyn Clock>,
}

impl PostChatMessageUseCase {
    pub fn new(rooms: Arc<dyn RoomRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { rooms, clock }
    }

    pub async fn execute(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        username: String,
        content: String,
    ) -> Result<PostedMessage, PostChatMessageError> {
        if content.trim().is_empty() {
            return Err(PostChatMessageError::EmptyContent);
        }

        let now = self.clock.now();
        let room = self.rooms.get_or_create(room_id, now).await;

        let message_id = nanos_id("msg", now);
        let message = ChatMessage {
            id: message_id.clone(),
            user_id,
            username,
            content,
            created_at: now,
        };
        let report = room.broadcast(&ChatEvent::message(message, now), None).await;
        tracing::debug!(
            "Message {} posted to room '{}' (delivered: {}, dropped: {})",
            message_id,
            room_id,
            report.delivered,
            report.dropped
        );

        Ok(PostedMessage { message_id, report })
    }
}
