//! UseCase: チャットルームへの参加

use std::sync::Arc;

use hanashi_shared::time::Clock;

use crate::domain::{BroadcastReport, ChatEvent, RoomId, RoomRepository, UserId};

/// 参加結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRoom {
    pub message: String,
    pub report: BroadcastReport,
}

/// チャットルーム参加のユースケース
///
/// Room が無ければ作成し、参加者本人を除く購読者に user_joined を配信します。
pub struct JoinRoomUseCase {
    rooms: Arc<dyn RoomRepository>,
    clock: Arc<dyn Clock>,
}

impl JoinRoomUseCase {
    pub fn new(rooms: Arc<dyn RoomRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { rooms, clock }
    }

    pub async fn execute(&self, room_id: &RoomId, user_id: UserId, username: String) -> JoinedRoom {
        let now = self.clock.now();
        let room = self.rooms.get_or_create(room_id, now).await;

        let event = ChatEvent::user_joined(user_id.clone(), username, now);
        let report = room.broadcast(&event, Some(&user_id)).await;
        tracing::info!(
            "User '{}' joined room '{}' (notified: {}, dropped: {})",
            user_id,
            room_id,
            report.delivered,
            report.dropped
        );

        JoinedRoom {
            message: format!("Successfully joined room {}", room_id),
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ChatEventPayload, subscriber_channel},
        infrastructure::repository::InMemoryRoomRepository,
    };
    use hanashi_shared::time::FixedClock;

    #[tokio::test]
    async fn test_join_notifies_other_subscribers_only() {
        // テスト項目: 参加イベントは本人以外の購読者にだけ届く
        // given (前提条件):
        let clock = Arc::new(FixedClock::from_millis(1_704_067_200_000));
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let usecase = JoinRoomUseCase::new(rooms.clone(), clock.clone());
        let room_id = RoomId::new("r1".to_string()).unwrap();
        let alice = UserId::new("alice".to_string()).unwrap();
        let bob = UserId::new("bob".to_string()).unwrap();

        let room = rooms.get_or_create(&room_id, clock.now()).await;
        let (alice_tx, mut alice_rx) = subscriber_channel();
        let (bob_tx, mut bob_rx) = subscriber_channel();
        room.add_subscriber(alice.clone(), alice_tx, clock.now()).await;
        room.add_subscriber(bob.clone(), bob_tx, clock.now()).await;

        // when (操作):
        let joined = usecase
            .execute(&room_id, bob.clone(), "Bob".to_string())
            .await;

        // then (期待する結果):
        assert_eq!(joined.message, "Successfully joined room r1");
        assert_eq!(joined.report.delivered, 1);
        let event = alice_rx.try_recv().unwrap();
        assert_eq!(event.user_id, bob);
        assert_eq!(
            event.payload,
            ChatEventPayload::UserJoined {
                username: "Bob".to_string()
            }
        );
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_creates_room_lazily() {
        // テスト項目: 存在しない Room への参加で Room が作成される
        // given (前提条件):
        let clock = Arc::new(FixedClock::from_millis(0));
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let usecase = JoinRoomUseCase::new(rooms.clone(), clock);
        let room_id = RoomId::new("lobby".to_string()).unwrap();

        // when (操作):
        let joined = usecase
            .execute(
                &room_id,
                UserId::new("alice".to_string()).unwrap(),
                "Alice".to_string(),
            )
            .await;

        // then (期待する結果):
        assert_eq!(joined.report, BroadcastReport::default());
        assert!(rooms.get(&room_id).await.is_some());
    }
}
