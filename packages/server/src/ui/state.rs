//! Server state shared by every handler.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    domain::SessionRepository,
    ui::middleware::Authenticator,
    usecase::{
        BridgeAudioStreamUseCase, EndConversationUseCase, JoinRoomUseCase,
        ListConversationsUseCase, ListRoomsUseCase, PostChatMessageUseCase,
        SendConversationMessageUseCase, StartConversationUseCase,
        StreamConversationEventsUseCase, SubscribeRoomUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// 呼び出し元の識別
    pub authenticator: Authenticator,
    /// Session レジストリ（ヘルスチェック用）
    pub sessions: Arc<dyn SessionRepository>,
    /// サーバー全体の停止トークン。接続ごとのトークンはこの子として作る
    pub shutdown: CancellationToken,
    /// 推論サービス無しで動作しているか
    pub degraded: bool,
    /// クライアントからの無通信で接続を切るまでの時間（`None` なら切らない）
    pub idle_timeout: Option<Duration>,

    pub join_room_usecase: Arc<JoinRoomUseCase>,
    pub post_chat_message_usecase: Arc<PostChatMessageUseCase>,
    pub subscribe_room_usecase: Arc<SubscribeRoomUseCase>,
    pub list_rooms_usecase: Arc<ListRoomsUseCase>,
    pub start_conversation_usecase: Arc<StartConversationUseCase>,
    pub end_conversation_usecase: Arc<EndConversationUseCase>,
    pub send_conversation_message_usecase: Arc<SendConversationMessageUseCase>,
    pub list_conversations_usecase: Arc<ListConversationsUseCase>,
    pub stream_conversation_events_usecase: Arc<StreamConversationEventsUseCase>,
    pub bridge_audio_stream_usecase: Arc<BridgeAudioStreamUseCase>,
}
