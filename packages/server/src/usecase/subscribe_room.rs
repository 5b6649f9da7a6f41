//! UseCase: チャットルームのイベント購読
//!
//! ## 購読者の状態遷移
//!
//! Joining → Subscribed → Draining → Closed
//!
//! - Joining: [`SubscribeRoomUseCase::execute`] がチャンネルを登録し、ウェルカムイベントを用意する
//! - Subscribed: 呼び出し側が [`Subscription::recv`] でイベントを受け取り続ける
//! - Draining: クライアント切断・キャンセル・チャンネルの置き換え
//! - Closed: [`Subscription::close`] で Room から削除される
//!
//! `close()` を呼ばずに `Subscription` が drop された場合も、削除はバックグラウンドで行われます。

use std::sync::Arc;

use hanashi_shared::time::{Clock, nanos_id};
use tokio::sync::mpsc::WeakSender;

use crate::domain::{
    BroadcastReport, ChatEvent, ChatMessage, EventReceiver, Room, RoomId, RoomRepository, UserId,
    subscriber_channel,
};

/// システムメッセージの表示名
pub const SYSTEM_USERNAME: &str = "System";

/// Room への購読
///
/// 受信側チャンネルと、Room から自分を外すための弱参照を持つガードです。
pub struct Subscription {
    room: Arc<Room>,
    user_id: UserId,
    handle: WeakSender<ChatEvent>,
    receiver: EventReceiver,
    welcome: ChatEvent,
    clock: Arc<dyn Clock>,
    closed: bool,
}

impl Subscription {
    pub fn room_id(&self) -> &RoomId {
        self.room.id()
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// 受信ループの前に送るウェルカムイベント
    pub fn welcome(&self) -> &ChatEvent {
        &self.welcome
    }

    /// 次のイベントを待つ。Room から外された（または置き換えられた）場合は `None`
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        self.receiver.recv().await
    }

    /// Room から自分を削除し、他の購読者に user_left を配信する。
    ///
    /// 同じ ID の新しい接続に置き換えられていた場合は何もせず `None` を返す。二度目以降の呼び出しも `None`。
    pub async fn close(&mut self) -> Option<BroadcastReport> {
        if self.closed {
            return None;
        }
        self.closed = true;
        self.receiver.close();

        let report = self
            .room
            .remove_subscriber_if_current(&self.user_id, &self.handle, self.clock.now())
            .await;
        match &report {
            Some(report) => tracing::info!(
                "User '{}' left room '{}' (notified: {})",
                self.user_id,
                self.room.id(),
                report.delivered
            ),
            None => tracing::debug!(
                "Subscription of '{}' in room '{}' was already replaced",
                self.user_id,
                self.room.id()
            ),
        }
        report
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let room = self.room.clone();
        let user_id = self.user_id.clone();
        let handle = self.handle.clone();
        let now = self.clock.now();
        runtime.spawn(async move {
            room.remove_subscriber_if_current(&user_id, &handle, now).await;
        });
    }
}

/// Room 購読のユースケース
pub struct SubscribeRoomUseCase {
    rooms: Arc<dyn RoomRepository>,
    clock: Arc<dyn Clock>,
}

impl SubscribeRoomUseCase {
    pub fn new(rooms: Arc<dyn RoomRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { rooms, clock }
    }

    pub async fn execute(&self, room_id: &RoomId, user_id: UserId) -> Subscription {
        let now = self.clock.now();
        let room = self.rooms.get_or_create(room_id, now).await;

        let (sender, receiver) = subscriber_channel();
        let handle = sender.downgrade();
        room.add_subscriber(user_id.clone(), sender, now).await;
        tracing::info!("User '{}' subscribed to room '{}'", user_id, room_id);

        let welcome = ChatEvent::message(
            ChatMessage {
                id: nanos_id("welcome", now),
                user_id: UserId::system(),
                username: SYSTEM_USERNAME.to_string(),
                content: format!("Welcome to room {}!", room_id),
                created_at: now,
            },
            now,
        );

        Subscription {
            room,
            user_id,
            handle,
            receiver,
            welcome,
            clock: self.clock.clone(),
            closed: false,
        }
    }
}
