//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    Conversation, HistoryMessage, RepositoryError, Room, RoomId, RoomSummary, SessionId, UserId,
};

/// Room レジストリ
///
/// 同じ RoomId に対しては、全ての呼び出し元に同一の Room インスタンスを返す。
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Room を取得し、存在しなければ作成する（並行呼び出しに対してアトミック）
    async fn get_or_create(&self, room_id: &RoomId, now: DateTime<Utc>) -> Arc<Room>;

    /// 既存の Room を取得
    async fn get(&self, room_id: &RoomId) -> Option<Arc<Room>>;

    /// 全 Room のスナップショット（RoomId でソート）
    async fn list(&self) -> Vec<RoomSummary>;

    /// 購読者がおらず `idle_for` 以上アクティビティのない Room を削除し、その ID を返す
    async fn evict_idle(&self, idle_for: Duration, now: DateTime<Utc>) -> Vec<RoomId>;
}

/// 会話セッションのレジストリ（セッション ID → active フラグ）
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// セッションを active として登録
    async fn activate(&self, session_id: SessionId);

    /// セッションを削除。存在していた場合は true
    async fn remove(&self, session_id: &SessionId) -> bool;

    async fn is_active(&self, session_id: &SessionId) -> bool;

    async fn active_sessions(&self) -> Vec<SessionId>;
}

/// 会話履歴ストア
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// 会話を作成。同じセッション ID が既にあれば `Duplicate`
    async fn create(&self, conversation: Conversation) -> Result<(), RepositoryError>;

    /// 会話を取得。存在しなければ `NotFound`
    async fn find(&self, session_id: &SessionId) -> Result<Conversation, RepositoryError>;

    /// メッセージを追加。終了済みの会話には `ConstraintViolation`
    async fn append_message(
        &self,
        session_id: &SessionId,
        message: HistoryMessage,
    ) -> Result<(), RepositoryError>;

    /// 会話を終了状態にする
    async fn finish(&self, session_id: &SessionId, ended_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// ユーザーの会話一覧（開始時刻順）
    async fn find_by_user(&self, user_id: &UserId) -> Vec<Conversation>;
}
