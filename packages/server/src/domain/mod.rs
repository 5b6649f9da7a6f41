//! ドメイン層
//!
//! Room / 会話のモデルと、Infrastructure 層が実装するインターフェース（trait）を定義します。

pub mod conversation;
pub mod entity;
pub mod error;
pub mod repository;
pub mod responder;
pub mod room;
pub mod upstream;
pub mod value_object;

pub use conversation::{
    ClientFrame, ConversationContent, ConversationRequest, ConversationResponse,
    END_OF_SPEECH_TOKEN, MIN_AUDIO_RESPONSE_BYTES, SetupConfig, UpstreamFrame, UpstreamReply,
};
pub use entity::{ChatEvent, ChatEventPayload, ChatMessage, Conversation, HistoryMessage, MessageRole};
pub use error::{RepositoryError, UpstreamError, ValueObjectError};
pub use repository::{ConversationRepository, RoomRepository, SessionRepository};
pub use responder::Responder;
pub use room::{
    BroadcastReport, EventReceiver, EventSender, Room, RoomSummary, SUBSCRIBER_QUEUE_CAPACITY,
    subscriber_channel,
};
pub use upstream::{UpstreamConnector, UpstreamReceiver, UpstreamSender, UpstreamStream};
pub use value_object::{Language, Plan, RoomId, SessionId, UserId};

#[cfg(test)]
pub use responder::MockResponder;
