//! 推論サービスが無い環境（degraded モード）向けのローカル応答

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use hanashi_shared::time::{Clock, nanos_id, time_derived_id};

use crate::domain::{
    ConversationContent, ConversationRequest, ConversationResponse, Language, Responder, SessionId,
    UpstreamError, UserId,
};

/// 決まった文面を返す Responder
///
/// セッション ID は `session_<YYYYMMDDHHMMSSmmm>_<連番>` 形式でローカルに採番します。
/// 同じミリ秒に開始された会話も連番で区別されます。
pub struct FallbackResponder {
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl FallbackResponder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sequence: AtomicU64::new(0),
        }
    }

    fn next_session_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{}", time_derived_id("session", self.clock.now()), sequence)
    }

    fn reply_text(request: &ConversationRequest) -> String {
        match &request.content {
            ConversationContent::Text(text) => format!(
                "[{}] The AI service is offline right now. You said: {}",
                request.character, text
            ),
            ConversationContent::Audio(bytes) => format!(
                "[{}] The AI service is offline right now. Received {} bytes of audio.",
                request.character,
                bytes.len()
            ),
        }
    }
}

#[async_trait]
impl Responder for FallbackResponder {
    async fn start_conversation(
        &self,
        user_id: &UserId,
        _username: &str,
        language: &Language,
    ) -> Result<SessionId, UpstreamError> {
        let session_id = self.next_session_id();
        tracing::info!(
            "Starting local conversation {} for user {} ({})",
            session_id,
            user_id,
            language
        );
        SessionId::new(session_id).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }

    async fn end_conversation(
        &self,
        session_id: &SessionId,
        _user_id: &UserId,
    ) -> Result<(), UpstreamError> {
        tracing::info!("Ending local conversation {}", session_id);
        Ok(())
    }

    async fn send_message(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, UpstreamError> {
        let now = self.clock.now();
        Ok(ConversationResponse {
            response_id: nanos_id("response", now),
            content: ConversationContent::Text(Self::reply_text(request)),
            language: request.language.clone(),
            is_final: true,
            timestamp: now,
        })
    }
}
