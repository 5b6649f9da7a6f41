//! Room ドメインモデル
//!
//! Room は購読者ごとの送信チャンネルを保持し、除外指定付きのブロードキャストを提供します。
//!
//! ## 配信ポリシー
//!
//! 各購読者のキューは容量 [`SUBSCRIBER_QUEUE_CAPACITY`] の有界チャンネルです。
//! ブロードキャストは `try_send` のみを使い、キューが満杯の購読者にはそのイベントを配信しません。
//! 遅い購読者がいても Room 全体の配信は止まりません。

use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};

use chrono::{DateTime, Utc};
use tokio::sync::{
    RwLock,
    mpsc::{self, error::TrySendError},
};

use super::{
    entity::ChatEvent,
    value_object::{RoomId, UserId},
};

/// 購読者キューの容量
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

/// 購読者へのイベント送信チャンネル
pub type EventSender = mpsc::Sender<ChatEvent>;
/// 購読者側の受信チャンネル
pub type EventReceiver = mpsc::Receiver<ChatEvent>;

/// 容量 [`SUBSCRIBER_QUEUE_CAPACITY`] の購読者チャンネルを作成
pub fn subscriber_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY)
}

/// ブロードキャストの結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// キューに積めた購読者数
    pub delivered: usize,
    /// キューが満杯（または受信側が閉じていた）ため配信できなかった購読者数
    pub dropped: usize,
}

/// Room のスナップショット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub subscribers: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// チャットルーム
pub struct Room {
    id: RoomId,
    created_at: DateTime<Utc>,
    last_active_millis: AtomicI64,
    subscribers: RwLock<HashMap<UserId, EventSender>>,
}

impl Room {
    pub fn new(id: RoomId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            last_active_millis: AtomicI64::new(created_at.timestamp_millis()),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_active_millis.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// 最終アクティブ時刻を更新（時刻は単調増加のみ）
    pub fn touch(&self, now: DateTime<Utc>) {
        self.last_active_millis
            .fetch_max(now.timestamp_millis(), Ordering::Relaxed);
    }

    /// 購読者を登録する。同じ ID が既に存在する場合は置き換える（古い送信側は破棄され、チャンネルは閉じる）。
    pub async fn add_subscriber(&self, subscriber_id: UserId, sender: EventSender, now: DateTime<Utc>) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.insert(subscriber_id.clone(), sender).is_some() {
            tracing::debug!(
                "Subscriber '{}' replaced in room '{}'",
                subscriber_id,
                self.id
            );
        }
        self.touch(now);
    }

    /// 購読者を削除し、残りの購読者に user-left を配信する。
    ///
    /// 存在しない ID を指定した場合、削除は何もしないが user-left は配信される。
    pub async fn remove_subscriber(&self, subscriber_id: &UserId, now: DateTime<Utc>) -> BroadcastReport {
        let mut subscribers = self.subscribers.write().await;
        // 送信側を drop することでチャンネルが閉じる
        subscribers.remove(subscriber_id);
        self.touch(now);

        let left = ChatEvent::user_left(subscriber_id.clone(), now);
        Self::deliver(&subscribers, &left, Some(subscriber_id))
    }

    /// `sender` が現在登録されているチャンネルと同一の場合のみ購読者を削除する。
    ///
    /// 同じ ID で再接続され置き換えられた古い接続が、新しい接続を削除しないようにするためのもの。
    /// 削除した場合は `Some(report)`、置き換え済みだった場合は `None` を返す。
    pub async fn remove_subscriber_if_current(
        &self,
        subscriber_id: &UserId,
        sender: &mpsc::WeakSender<ChatEvent>,
        now: DateTime<Utc>,
    ) -> Option<BroadcastReport> {
        let mut subscribers = self.subscribers.write().await;
        let current = subscribers.get(subscriber_id)?;
        let same = sender
            .upgrade()
            .is_some_and(|sender| sender.same_channel(current));
        if !same {
            return None;
        }
        subscribers.remove(subscriber_id);
        self.touch(now);

        let left = ChatEvent::user_left(subscriber_id.clone(), now);
        Some(Self::deliver(&subscribers, &left, Some(subscriber_id)))
    }

    /// `exclude` 以外の全購読者にイベントを配信する（ノンブロッキング）
    pub async fn broadcast(&self, event: &ChatEvent, exclude: Option<&UserId>) -> BroadcastReport {
        let subscribers = self.subscribers.read().await;
        self.touch(event.timestamp);
        Self::deliver(&subscribers, event, exclude)
    }

    fn deliver(
        subscribers: &HashMap<UserId, EventSender>,
        event: &ChatEvent,
        exclude: Option<&UserId>,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (subscriber_id, sender) in subscribers {
            if Some(subscriber_id) == exclude {
                continue;
            }
            match sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("Queue full for subscriber '{}', event dropped", subscriber_id);
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Queue closed for subscriber '{}', event dropped", subscriber_id);
                    report.dropped += 1;
                }
            }
        }
        report
    }

    pub async fn contains(&self, subscriber_id: &UserId) -> bool {
        self.subscribers.read().await.contains_key(subscriber_id)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// 購読者 ID 一覧（ソート済み）
    pub async fn subscriber_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.subscribers.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            subscribers: self.subscriber_ids().await,
            created_at: self.created_at,
            last_active_at: self.last_active_at(),
        }
    }
}
