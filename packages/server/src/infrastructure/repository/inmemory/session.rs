//! InMemory Session Repository 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{SessionId, SessionRepository};

/// セッション ID → active フラグのインメモリレジストリ
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<SessionId, bool>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn activate(&self, session_id: SessionId) {
        self.sessions.lock().await.insert(session_id, true);
    }

    async fn remove(&self, session_id: &SessionId) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    async fn is_active(&self, session_id: &SessionId) -> bool {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .copied()
            .unwrap_or(false)
    }

    async fn active_sessions(&self) -> Vec<SessionId> {
        let mut sessions: Vec<SessionId> = self
            .sessions
            .lock()
            .await
            .iter()
            .filter(|(_, active)| **active)
            .map(|(id, _)| id.clone())
            .collect();
        sessions.sort();
        sessions
    }
}
