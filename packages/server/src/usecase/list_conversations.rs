//! UseCase: ユーザーの会話履歴一覧

use std::sync::Arc;

use crate::domain::{Conversation, ConversationRepository, UserId};

pub struct ListConversationsUseCase {
    conversations: Arc<dyn ConversationRepository>,
}

impl ListConversationsUseCase {
    pub fn new(conversations: Arc<dyn ConversationRepository>) -> Self {
        Self { conversations }
    }

    /// 開始時刻順の会話一覧
    pub async fn execute(&self, user_id: &UserId) -> Vec<Conversation> {
        self.conversations.find_by_user(user_id).await
    }
}
