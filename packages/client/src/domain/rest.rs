//! RestApi trait 定義
//!
//! ユースケース層が必要とするバックエンド REST API のインターフェース。
//! 具体的な実装（reqwest）は Infrastructure 層が提供します（依存性の逆転）。
//!
//! 引数はすべて所有型で受け取ります。モックから呼び出し内容を検証しやすくするためです。

use async_trait::async_trait;

use super::{
    entity::{Conversation, Message, User},
    error::ApiError,
    request::{
        ConversationUpdate, CreateConversationRequest, Credentials, ProfileUpdate,
        PushSubscription, SendMessageRequest,
    },
    value_object::{ConversationId, MessageId, UserId},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RestApi: Send + Sync {
    // ========================================
    // Auth / Profile
    // ========================================

    /// ログインしてセッショントークンを取得
    async fn login(&self, credentials: Credentials) -> Result<String, ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;

    async fn get_profile(&self) -> Result<User, ApiError>;

    async fn update_profile(&self, update: ProfileUpdate) -> Result<User, ApiError>;

    /// アバター画像をアップロード（multipart）
    async fn upload_avatar(&self, file_name: String, bytes: Vec<u8>) -> Result<User, ApiError>;

    async fn get_contacts(&self) -> Result<Vec<User>, ApiError>;

    // ========================================
    // Conversations
    // ========================================

    async fn get_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, ApiError>;

    async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> Result<Conversation, ApiError>;

    async fn update_conversation(
        &self,
        id: ConversationId,
        update: ConversationUpdate,
    ) -> Result<Conversation, ApiError>;

    async fn delete_conversation(&self, id: ConversationId) -> Result<(), ApiError>;

    async fn search_conversations(&self, query: String) -> Result<Vec<Conversation>, ApiError>;

    async fn add_participant(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Conversation, ApiError>;

    async fn remove_participant(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Conversation, ApiError>;

    // ========================================
    // Messages
    // ========================================

    /// メッセージ履歴を取得（page は 1 始まり）
    async fn get_messages(
        &self,
        id: ConversationId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError>;

    async fn send_message(&self, request: SendMessageRequest) -> Result<Message, ApiError>;

    /// 既読にする（`message_ids` が空なら会話全体）
    async fn mark_messages_read(
        &self,
        id: ConversationId,
        message_ids: Vec<MessageId>,
    ) -> Result<(), ApiError>;

    // ========================================
    // Push notifications
    // ========================================

    async fn get_vapid_public_key(&self) -> Result<String, ApiError>;

    async fn register_push_subscription(
        &self,
        subscription: PushSubscription,
    ) -> Result<(), ApiError>;

    async fn unregister_push_subscription(&self, endpoint: String) -> Result<(), ApiError>;

    /// Ask the backend to push a test notification to this user's subscriptions.
    async fn send_test_notification(&self) -> Result<(), ApiError>;
}
