//! UseCase: 使われていない Room の削除

use std::{sync::Arc, time::Duration};

use hanashi_shared::time::Clock;

use crate::domain::{RoomId, RoomRepository};

pub struct EvictIdleRoomsUseCase {
    rooms: Arc<dyn RoomRepository>,
    clock: Arc<dyn Clock>,
    idle_for: Duration,
}

impl EvictIdleRoomsUseCase {
    pub fn new(rooms: Arc<dyn RoomRepository>, clock: Arc<dyn Clock>, idle_for: Duration) -> Self {
        Self {
            rooms,
            clock,
            idle_for,
        }
    }

    /// 購読者がおらず `idle_for` 以上アクティビティの無い Room を削除する
    pub async fn execute(&self) -> Vec<RoomId> {
        let evicted = self.rooms.evict_idle(self.idle_for, self.clock.now()).await;
        if !evicted.is_empty() {
            tracing::info!("Evicted {} idle room(s): {:?}", evicted.len(), evicted);
        }
        evicted
    }
}
