//! Repository の実装
//!
//! - `inmemory`: プロセス内の HashMap を使った実装（単一ノード前提）

pub mod inmemory;

pub use inmemory::{
    InMemoryConversationRepository, InMemoryRoomRepository, InMemorySessionRepository,
};
