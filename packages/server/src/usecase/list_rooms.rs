//! UseCase: Room 一覧の取得（デバッグ用）

use std::sync::Arc;

use crate::domain::{RoomRepository, RoomSummary};

pub struct ListRoomsUseCase {
    rooms: Arc<dyn RoomRepository>,
}

impl ListRoomsUseCase {
    pub fn new(rooms: Arc<dyn RoomRepository>) -> Self {
        Self { rooms }
    }

    pub async fn execute(&self) -> Vec<RoomSummary> {
        self.rooms.list().await
    }
}
