//! インメモリ Repository 実装

mod conversation;
mod room;
mod session;

pub use conversation::InMemoryConversationRepository;
pub use room::InMemoryRoomRepository;
pub use session::InMemorySessionRepository;
