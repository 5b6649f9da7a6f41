//! UseCase: 会話イベントのサーバープッシュ
//!
//! 接続と同時に会話を開始して conversation_started を送り、切断（キャンセル）時に会話を終了して
//! conversation_ended を送ります。接続中は一定間隔で keepalive をログに残します。

use std::{fmt::Display, sync::Arc, time::Duration};

use futures_util::{Sink, SinkExt};
use hanashi_shared::time::Clock;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::domain::{ChatEvent, Language, SessionId, UserId};

use super::{
    end_conversation::EndConversationUseCase, error::StartConversationError,
    start_conversation::StartConversationUseCase,
};

/// keepalive の間隔
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// イベントストリームの終了理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStreamOutcome {
    /// キャンセル（クライアント切断・サーバー停止）
    Cancelled,
    /// クライアントへの書き込みに失敗
    ClientWriteFailed(String),
}

pub struct StreamConversationEventsUseCase {
    start: Arc<StartConversationUseCase>,
    end: Arc<EndConversationUseCase>,
    clock: Arc<dyn Clock>,
    keepalive: Duration,
}

impl StreamConversationEventsUseCase {
    pub fn new(
        start: Arc<StartConversationUseCase>,
        end: Arc<EndConversationUseCase>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            start,
            end,
            clock,
            keepalive: KEEPALIVE_INTERVAL,
        }
    }

    pub async fn execute<K>(
        &self,
        user_id: UserId,
        username: String,
        language: Language,
        events: K,
        cancel: CancellationToken,
    ) -> Result<EventStreamOutcome, StartConversationError>
    where
        K: Sink<ChatEvent> + Send,
        K::Error: Display,
    {
        let mut events = std::pin::pin!(events);
        let session_id = self.start.execute(&user_id, &username, &language).await?;

        let started =
            ChatEvent::conversation_started(user_id.clone(), session_id.clone(), self.clock.now());
        let outcome = match events.send(started).await {
            Err(e) => EventStreamOutcome::ClientWriteFailed(e.to_string()),
            Ok(()) => {
                let mut ticker = interval_at(Instant::now() + self.keepalive, self.keepalive);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break EventStreamOutcome::Cancelled,
                        _ = ticker.tick() => {
                            tracing::debug!("Conversation {} keepalive", session_id);
                        }
                    }
                }
            }
        };

        self.finish(&session_id, &user_id).await;
        if outcome == EventStreamOutcome::Cancelled {
            let ended = ChatEvent::conversation_ended(user_id, session_id, self.clock.now());
            if let Err(e) = events.send(ended).await {
                tracing::debug!("Failed to send conversation_ended: {}", e);
            }
        }
        Ok(outcome)
    }

    async fn finish(&self, session_id: &SessionId, user_id: &UserId) {
        if let Err(e) = self.end.execute(session_id, user_id).await {
            tracing::warn!("Failed to end conversation {}: {}", session_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ChatEventPayload, MockResponder, UpstreamError},
        infrastructure::repository::{InMemoryConversationRepository, InMemorySessionRepository},
    };
    use hanashi_shared::time::FixedClock;
    use tokio::sync::mpsc;
    use tokio_util::sync::PollSender;

    fn usecase(responder: MockResponder) -> StreamConversationEventsUseCase {
        let responder = Arc::new(responder);
        let sessions = Arc::new(InMemorySessionRepository::new());
        let conversations = Arc::new(InMemoryConversationRepository::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::from_millis(0));
        StreamConversationEventsUseCase::new(
            Arc::new(StartConversationUseCase::new(
                responder.clone(),
                sessions.clone(),
                conversations.clone(),
                clock.clone(),
            )),
            Arc::new(EndConversationUseCase::new(
                responder,
                sessions,
                conversations,
                clock.clone(),
            )),
            clock,
        )
    }

    fn alice() -> UserId {
        UserId::new("alice".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_started_then_ended_on_cancel() {
        // テスト項目: 開始イベントの後、キャンセルで会話が終了し終了イベントが届く
        // given (前提条件):
        let mut responder = MockResponder::new();
        responder
            .expect_start_conversation()
            .returning(|_, _, _| Ok(SessionId::new("session_1".to_string()).unwrap()));
        responder
            .expect_end_conversation()
            .times(1)
            .returning(|_, _| Ok(()));
        let usecase = Arc::new(usecase(responder));
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task = {
            let usecase = usecase.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                usecase
                    .execute(
                        alice(),
                        "Alice".to_string(),
                        Language::new("ja".to_string()).unwrap(),
                        PollSender::new(tx),
                        cancel,
                    )
                    .await
            })
        };

        // when (操作):
        let started = rx.recv().await.unwrap();
        cancel.cancel();
        let ended = rx.recv().await.unwrap();

        // then (期待する結果):
        let session_id = SessionId::new("session_1".to_string()).unwrap();
        assert_eq!(
            started.payload,
            ChatEventPayload::ConversationStarted {
                session_id: session_id.clone()
            }
        );
        assert_eq!(
            ended.payload,
            ChatEventPayload::ConversationEnded { session_id }
        );
        assert_eq!(task.await.unwrap(), Ok(EventStreamOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_start_failure_sends_nothing() {
        // テスト項目: 会話を開始できない場合はイベントを送らずエラーを返す
        // given (前提条件):
        let mut responder = MockResponder::new();
        responder
            .expect_start_conversation()
            .returning(|_, _, _| Err(UpstreamError::Unavailable("down".to_string())));
        responder.expect_end_conversation().times(0);
        let usecase = usecase(responder);
        let (tx, mut rx) = mpsc::channel(8);

        // when (操作):
        let result = usecase
            .execute(
                alice(),
                "Alice".to_string(),
                Language::new("ja".to_string()).unwrap(),
                PollSender::new(tx),
                CancellationToken::new(),
            )
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(StartConversationError::Upstream(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_client_still_ends_conversation() {
        // テスト項目: クライアントが既に閉じていても会話は終了される
        // given (前提条件):
        let mut responder = MockResponder::new();
        responder
            .expect_start_conversation()
            .returning(|_, _, _| Ok(SessionId::new("session_1".to_string()).unwrap()));
        responder
            .expect_end_conversation()
            .times(1)
            .returning(|_, _| Ok(()));
        let usecase = usecase(responder);
        let (tx, rx) = mpsc::channel::<ChatEvent>(8);
        drop(rx);

        // when (操作):
        let result = usecase
            .execute(
                alice(),
                "Alice".to_string(),
                Language::new("ja".to_string()).unwrap(),
                PollSender::new(tx),
                CancellationToken::new(),
            )
            .await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Ok(EventStreamOutcome::ClientWriteFailed(_))
        ));
    }
}
