//! UseCase 層
//!
//! 1 ユースケース 1 構造体。依存は `Arc<dyn Trait>` で受け取り、`execute()` で実行します。

pub mod bridge_audio_stream;
pub mod end_conversation;
pub mod error;
pub mod evict_idle_rooms;
pub mod join_room;
pub mod list_conversations;
pub mod list_rooms;
pub mod post_chat_message;
pub mod send_conversation_message;
pub mod start_conversation;
pub mod stream_conversation_events;
pub mod subscribe_room;

pub use bridge_audio_stream::{BridgeAudioStreamUseCase, BridgeOutcome};
pub use end_conversation::EndConversationUseCase;
pub use error::{
    BridgeError, EndConversationError, PostChatMessageError, SendConversationMessageError,
    StartConversationError,
};
pub use evict_idle_rooms::EvictIdleRoomsUseCase;
pub use join_room::{JoinRoomUseCase, JoinedRoom};
pub use list_conversations::ListConversationsUseCase;
pub use list_rooms::ListRoomsUseCase;
pub use post_chat_message::{PostChatMessageUseCase, PostedMessage};
pub use send_conversation_message::SendConversationMessageUseCase;
pub use start_conversation::StartConversationUseCase;
pub use stream_conversation_events::{
    EventStreamOutcome, KEEPALIVE_INTERVAL, StreamConversationEventsUseCase,
};
pub use subscribe_room::{SYSTEM_USERNAME, SubscribeRoomUseCase, Subscription};
