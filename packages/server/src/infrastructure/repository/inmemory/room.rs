//! InMemory Room Repository 実装
//!
//! ドメイン層が定義する RoomRepository trait の具体的な実装。
//! HashMap をインメモリのレジストリとして使用します。
//!
//! ## ロックの方針
//!
//! - レジストリ全体: `Mutex<HashMap<RoomId, Arc<Room>>>`（Room の追加・削除のみ）
//! - Room 内部: Room ごとの `RwLock`（購読者の追加・削除・配信）
//!
//! 関係のない Room 同士が同じロックで直列化されることはありません。
//! ロックの取得順序は常に「レジストリ → Room」です。

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{Room, RoomId, RoomRepository, RoomSummary};

/// インメモリ Room Repository 実装
#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
}

impl InMemoryRoomRepository {
    /// 新しい InMemoryRoomRepository を作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn get_or_create(&self, room_id: &RoomId, now: DateTime<Utc>) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                tracing::info!("Room '{}' created", room_id);
                Arc::new(Room::new(room_id.clone(), now))
            })
            .clone();
        // 取得直後の Room がアイドル判定で削除されないようにする
        room.touch(now);
        room
    }

    async fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    async fn list(&self) -> Vec<RoomSummary> {
        let rooms: Vec<Arc<Room>> = self.rooms.lock().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            summaries.push(room.summary().await);
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    async fn evict_idle(&self, idle_for: Duration, now: DateTime<Utc>) -> Vec<RoomId> {
        let idle_for = chrono::Duration::from_std(idle_for).unwrap_or(chrono::Duration::MAX);
        let mut rooms = self.rooms.lock().await;

        let mut evicted = Vec::new();
        for (room_id, room) in rooms.iter() {
            let idle = now.signed_duration_since(room.last_active_at()) >= idle_for;
            if idle && room.subscriber_count().await == 0 {
                evicted.push(room_id.clone());
            }
        }
        for room_id in &evicted {
            rooms.remove(room_id);
            tracing::info!("Room '{}' evicted after being idle", room_id);
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UserId, subscriber_channel};
    use hanashi_shared::time::{Clock, FixedClock};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - InMemoryRoomRepository の get_or_create / get / list / evict_idle
    //
    // 【なぜこのテストが必要か】
    // - 同じ RoomId には常に同じ Room インスタンスが返る必要がある
    // - 並行アクセス時にも Room が二重に作成されないことを保証する
    // - アイドル Room の削除が購読者のいる Room を巻き込まないことを保証する
    //
    // 【どのようなシナリオをテストするか】
    // 1. 同一 ID での get_or_create が同じインスタンスを返す
    // 2. 並行 get_or_create でも 1 つしか作成されない
    // 3. list がソート済みのスナップショットを返す
    // 4. evict_idle が空かつアイドルな Room のみ削除する
    // ========================================

    fn now() -> DateTime<Utc> {
        FixedClock::from_millis(1_704_067_200_000).now()
    }

    fn room_id(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_instance() {
        // テスト項目: 同じ RoomId に対して同一の Room インスタンスが返される
        // given (前提条件):
        let repo = InMemoryRoomRepository::new();

        // when (操作):
        let first = repo.get_or_create(&room_id("r1"), now()).await;
        let second = repo.get_or_create(&room_id("r1"), now()).await;

        // then (期待する結果):
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(repo.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_is_atomic_under_concurrency() {
        // テスト項目: 並行して get_or_create しても Room は 1 つだけ作成される
        // given (前提条件):
        let repo = Arc::new(InMemoryRoomRepository::new());

        // when (操作):
        let mut handles = Vec::new();
        for _ in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.get_or_create(&room_id("shared"), now()).await
            }));
        }
        let mut rooms = Vec::new();
        for handle in handles {
            rooms.push(handle.await.unwrap());
        }

        // then (期待する結果):
        assert!(rooms.iter().all(|room| Arc::ptr_eq(room, &rooms[0])));
        assert_eq!(repo.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_returns_none_for_unknown_room() {
        // テスト項目: 存在しない Room の取得は None を返す
        // given (前提条件):
        let repo = InMemoryRoomRepository::new();

        // when (操作):
        let result = repo.get(&room_id("missing")).await;

        // then (期待する結果):
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_returns_sorted_summaries() {
        // テスト項目: list が RoomId でソートされた一覧と購読者を返す
        // given (前提条件):
        let repo = InMemoryRoomRepository::new();
        repo.get_or_create(&room_id("zeta"), now()).await;
        let alpha = repo.get_or_create(&room_id("alpha"), now()).await;
        let (tx, _rx) = subscriber_channel();
        alpha
            .add_subscriber(UserId::new("alice".to_string()).unwrap(), tx, now())
            .await;

        // when (操作):
        let summaries = repo.list().await;

        // then (期待する結果):
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id.as_str(), "alpha");
        assert_eq!(summaries[0].subscribers.len(), 1);
        assert_eq!(summaries[1].id.as_str(), "zeta");
    }

    #[tokio::test]
    async fn test_evict_idle_removes_only_empty_idle_rooms() {
        // テスト項目: 購読者がおらず閾値以上アイドルな Room のみ削除される
        // given (前提条件):
        let repo = InMemoryRoomRepository::new();
        repo.get_or_create(&room_id("empty-idle"), now()).await;
        let busy = repo.get_or_create(&room_id("busy-idle"), now()).await;
        let (tx, _rx) = subscriber_channel();
        busy.add_subscriber(UserId::new("bob".to_string()).unwrap(), tx, now())
            .await;
        let later = now() + chrono::Duration::seconds(300);
        repo.get_or_create(&room_id("empty-recent"), later).await;

        // when (操作):
        let evicted = repo
            .evict_idle(Duration::from_secs(120), later + chrono::Duration::seconds(60))
            .await;

        // then (期待する結果):
        assert_eq!(evicted, vec![room_id("empty-idle")]);
        assert!(repo.get(&room_id("empty-idle")).await.is_none());
        assert!(repo.get(&room_id("busy-idle")).await.is_some());
        assert!(repo.get(&room_id("empty-recent")).await.is_some());
    }
}
