//! Conversation State Store
//!
//! 会話一覧・選択中の会話のメッセージ・未読数・入力中ユーザーの唯一の保持者。
//! 状態はすべて [`Signal`] に置き、値全体の置き換えでのみ更新する。
//!
//! ## 選択のライフサイクル
//!
//! `unselected → selecting（旧ルームから退出・新ルームに参加・1 ページ目を取得）→ selected`
//!
//! 取得に失敗しても `selected` に遷移し、メッセージ一覧は直前のまま残る。
//!
//! ## 受信メッセージの適用順序
//!
//! 1. 選択中の一覧に同じ ID がある、または会話の最終メッセージと同じ ID なら捨てる
//! 2. 選択中の会話宛てなら一覧に追加する
//! 3. 会話の最終メッセージと更新時刻を更新する（選択状態に関わらず）
//! 4. 送信者が自分ではなく、かつ選択中の会話でなければ未読数を 1 増やす

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::{
    domain::{
        ApiError, Computed, Conversation, ConversationId, ConversationUpdate,
        CreateConversationRequest, InboundEvent, Message, MessageId, RestApi,
        SendMessageRequest, Signal, TypingMap, User, UserId, UserStatus,
        conversation,
        event::{MessageDeleteData, MessageReceiveData, MessageSendData},
        typing,
    },
    usecase::{connection::ConnectionManager, router::EventHandler, timer::TimerSet},
};

/// 選択のライフサイクル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Unselected,
    Selecting,
    Selected,
}

fn dedup_by_id(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = std::collections::HashSet::new();
    messages
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

/// Conversation State Store
#[derive(Clone)]
pub struct ConversationStore {
    api: Arc<dyn RestApi>,
    connection: ConnectionManager,
    current_user: Signal<Option<User>>,
    conversations: Signal<Vec<Conversation>>,
    selected_id: Signal<Option<ConversationId>>,
    selection_state: Signal<SelectionState>,
    messages: Signal<Vec<Message>>,
    typing: Signal<TypingMap>,
    typing_timers: TimerSet<(ConversationId, UserId)>,
    typing_expiry: Duration,
    page_size: u32,
    /// bumped on every selection change and on clear
    selection_seq: Arc<AtomicU64>,
    total_unread: Arc<Computed<u32>>,
    selected_conversation: Arc<Computed<Option<Conversation>>>,
}

impl ConversationStore {
    pub fn new(
        api: Arc<dyn RestApi>,
        connection: ConnectionManager,
        current_user: Signal<Option<User>>,
        typing_expiry: Duration,
        page_size: u32,
    ) -> Self {
        let conversations: Signal<Vec<Conversation>> = Signal::default();
        let selected_id: Signal<Option<ConversationId>> = Signal::default();

        let total_unread = Arc::new(conversations.map(|list| conversation::total_unread(list)));
        let selected_conversation = {
            let (list, selected) = (conversations.clone(), selected_id.clone());
            Arc::new(Computed::new(
                vec![conversations.dependency(), selected_id.dependency()],
                move || {
                    selected.with(|id| {
                        id.as_ref()
                            .and_then(|id| list.with(|l| conversation::find(l, id).cloned()))
                    })
                },
            ))
        };

        Self {
            api,
            connection,
            current_user,
            conversations,
            selected_id,
            selection_state: Signal::new(SelectionState::Unselected),
            messages: Signal::default(),
            typing: Signal::default(),
            typing_timers: TimerSet::new(),
            typing_expiry,
            page_size,
            selection_seq: Arc::new(AtomicU64::new(0)),
            total_unread,
            selected_conversation,
        }
    }

    // ========================================
    // Read-only views
    // ========================================

    pub fn current_user(&self) -> Signal<Option<User>> {
        self.current_user.clone()
    }

    pub fn conversations(&self) -> Signal<Vec<Conversation>> {
        self.conversations.clone()
    }

    pub fn selected_id(&self) -> Signal<Option<ConversationId>> {
        self.selected_id.clone()
    }

    pub fn selection_state(&self) -> Signal<SelectionState> {
        self.selection_state.clone()
    }

    pub fn messages(&self) -> Signal<Vec<Message>> {
        self.messages.clone()
    }

    pub fn typing(&self) -> Signal<TypingMap> {
        self.typing.clone()
    }

    /// 全会話の未読数の合計
    pub fn total_unread(&self) -> u32 {
        self.total_unread.get()
    }

    pub fn selected_conversation(&self) -> Option<Conversation> {
        self.selected_conversation.get()
    }

    pub fn typing_users(&self, conversation_id: &ConversationId) -> Vec<UserId> {
        self.typing
            .with(|map| typing::typing_users(map, conversation_id))
    }

    /// 入力中表示の文言（誰も入力していなければ `None`）
    pub fn typing_text(&self, conversation_id: &ConversationId) -> Option<String> {
        let count = self.typing_users(conversation_id).len();
        self.conversations.with(|list| {
            conversation::find(list, conversation_id)
                .and_then(|c| typing::typing_text(c, count))
        })
    }

    fn is_me(&self, user_id: &UserId) -> bool {
        self.current_user
            .with(|me| me.as_ref().is_some_and(|me| &me.id == user_id))
    }

    fn is_selected(&self, conversation_id: &ConversationId) -> bool {
        self.selected_id
            .with(|selected| selected.as_ref() == Some(conversation_id))
    }

    // ========================================
    // Conversations
    // ========================================

    /// 会話一覧を取得して丸ごと置き換える。失敗時は一覧を変更しない。
    pub async fn load_conversations(&self) -> Result<(), ApiError> {
        match self.api.get_conversations().await {
            Ok(list) => {
                tracing::info!("Loaded {} conversation(s)", list.len());
                self.conversations.set(list);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to load conversations: {}", e);
                Err(e)
            }
        }
    }

    /// 会話を選択する（`None` で選択解除）
    pub async fn select_conversation(&self, id: Option<ConversationId>) -> Result<(), ApiError> {
        let previous = self.selected_id.get();
        if previous == id {
            tracing::debug!("Conversation already selected");
            return Ok(());
        }
        let seq = self.selection_seq.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(previous) = previous {
            self.connection.leave_conversation(previous);
        }
        self.selected_id.set(id.clone());

        let Some(id) = id else {
            self.messages.set(Vec::new());
            self.selection_state.set(SelectionState::Unselected);
            return Ok(());
        };

        self.selection_state.set(SelectionState::Selecting);
        self.connection.join_conversation(id.clone());

        let unread = self.conversations.with(|list| {
            conversation::find(list, &id)
                .map(|c| c.unread_count)
                .unwrap_or(0)
        });
        if unread > 0 {
            self.conversations
                .update(|list| conversation::with_unread_cleared(list, &id));
            self.connection.mark_messages_read(id.clone());
            if let Err(e) = self.api.mark_messages_read(id.clone(), Vec::new()).await {
                tracing::warn!("Failed to mark '{}' as read: {}", id, e);
            }
        }

        let fetched = self.api.get_messages(id.clone(), 1, self.page_size).await;
        if self.selection_seq.load(Ordering::SeqCst) != seq {
            tracing::debug!("Selection moved on; discarding messages of '{}'", id);
            return Ok(());
        }
        self.selection_state.set(SelectionState::Selected);

        match fetched {
            Ok(messages) => {
                tracing::debug!("Loaded {} message(s) for '{}'", messages.len(), id);
                self.messages.set(dedup_by_id(messages));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to load messages of '{}': {}", id, e);
                Err(e)
            }
        }
    }

    /// 会話を 1 件取得して一覧に反映し、選択する
    pub async fn open_conversation(&self, id: ConversationId) -> Result<(), ApiError> {
        let fetched = self.api.get_conversation(id.clone()).await?;
        self.conversations.update(|list| {
            if conversation::find(list, &fetched.id).is_some() {
                conversation::with_replaced(list, &fetched)
            } else {
                conversation::with_prepended(list, fetched.clone())
            }
        });
        self.select_conversation(Some(id)).await
    }

    pub async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> Result<Conversation, ApiError> {
        let created = self.api.create_conversation(request).await?;
        tracing::info!("Created conversation '{}'", created.id);
        self.conversations
            .update(|list| conversation::with_prepended(list, created.clone()));
        Ok(created)
    }

    pub async fn update_conversation(
        &self,
        id: ConversationId,
        update: ConversationUpdate,
    ) -> Result<Conversation, ApiError> {
        let updated = self.api.update_conversation(id, update).await?;
        self.conversations
            .update(|list| conversation::with_replaced(list, &updated));
        Ok(updated)
    }

    pub async fn add_participant(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Conversation, ApiError> {
        let updated = self.api.add_participant(id, user_id).await?;
        self.conversations
            .update(|list| conversation::with_replaced(list, &updated));
        Ok(updated)
    }

    pub async fn remove_participant(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Conversation, ApiError> {
        let updated = self.api.remove_participant(id, user_id).await?;
        self.conversations
            .update(|list| conversation::with_replaced(list, &updated));
        Ok(updated)
    }

    /// 会話を削除する。選択中だった場合は選択とメッセージ一覧も消す。
    pub async fn delete_conversation(&self, id: ConversationId) -> Result<(), ApiError> {
        self.api.delete_conversation(id.clone()).await?;
        tracing::info!("Deleted conversation '{}'", id);
        self.conversations
            .update(|list| conversation::without(list, &id));

        if self.is_selected(&id) {
            self.selection_seq.fetch_add(1, Ordering::SeqCst);
            self.connection.leave_conversation(id);
            self.selected_id.set(None);
            self.messages.set(Vec::new());
            self.selection_state.set(SelectionState::Unselected);
        }
        Ok(())
    }

    /// 会話を検索する（ストアの状態は変更しない）
    pub async fn search_conversations(&self, query: &str) -> Result<Vec<Conversation>, ApiError> {
        self.api.search_conversations(query.to_string()).await
    }

    // ========================================
    // Messages
    // ========================================

    /// イベントストリームで送信する（接続していなければ何もしない）
    pub fn send_message(&self, message: MessageSendData) -> bool {
        self.connection.send_message(message)
    }

    /// REST で送信し、確定したメッセージを反映する
    pub async fn post_message(&self, request: SendMessageRequest) -> Result<Message, ApiError> {
        let message = self.api.send_message(request).await?;

        if self.is_selected(&message.conversation_id) {
            self.messages.update_if(|list| {
                (!conversation::contains_message(list, &message.id)).then(|| {
                    let mut next = list.clone();
                    next.push(message.clone());
                    next
                })
            });
        }
        self.conversations
            .update(|list| conversation::with_last_message(list, &message));
        Ok(message)
    }

    pub fn delete_message(&self, conversation_id: ConversationId, message_id: MessageId) -> bool {
        self.connection.delete_message(MessageDeleteData {
            message_id,
            conversation_id,
        })
    }

    pub fn set_current_user(&self, user: Option<User>) {
        self.current_user.set(user);
    }

    // ========================================
    // Inbound events
    // ========================================

    fn apply_message(&self, data: &MessageReceiveData) {
        let message: Message = data.clone().into();
        let conversation_id = message.conversation_id.clone();
        let is_last = |list: &[Conversation]| {
            conversation::is_last_message(list, &conversation_id, &message.id)
        };

        if self.conversations.with(|list| is_last(list)) {
            tracing::debug!("Ignoring duplicate message '{}'", message.id);
            return;
        }

        // the duplicate check and the append share one critical section
        let active = self.is_selected(&conversation_id);
        if active {
            let appended = self.messages.update_if(|list| {
                (!conversation::contains_message(list, &message.id)).then(|| {
                    let mut next = list.clone();
                    next.push(message.clone());
                    next
                })
            });
            if !appended {
                tracing::debug!("Ignoring duplicate message '{}'", message.id);
                return;
            }
        }

        let increment = !active && !self.is_me(&message.sender.id);
        self.conversations.update_if(|list| {
            if !active && is_last(list) {
                return None;
            }
            let next = conversation::with_last_message(list, &message);
            Some(if increment {
                conversation::with_unread_incremented(&next, &conversation_id)
            } else {
                next
            })
        });
    }

    fn apply_message_deleted(&self, conversation_id: &ConversationId, message_id: &MessageId) {
        if !self.is_selected(conversation_id) {
            return;
        }
        self.messages.update_if(|list| {
            conversation::contains_message(list, message_id)
                .then(|| list.iter().filter(|m| &m.id != message_id).cloned().collect())
        });
    }

    fn apply_messages_read(&self, conversation_id: &ConversationId, user_id: &UserId) {
        if !self.is_me(user_id) {
            return;
        }
        self.conversations.update_if(|list| {
            conversation::find(list, conversation_id)
                .is_some_and(|c| c.unread_count > 0)
                .then(|| conversation::with_unread_cleared(list, conversation_id))
        });
    }

    fn apply_typing_start(&self, conversation_id: &ConversationId, user_id: &UserId) {
        if self.is_me(user_id) {
            return;
        }
        self.typing
            .update_if(|map| typing::with_typing(map, conversation_id, user_id, true));

        let typing_map = self.typing.clone();
        let (conversation, user) = (conversation_id.clone(), user_id.clone());
        self.typing_timers.schedule(
            (conversation_id.clone(), user_id.clone()),
            self.typing_expiry,
            move || {
                if typing_map.update_if(|map| typing::with_typing(map, &conversation, &user, false))
                {
                    tracing::debug!("Typing indicator of '{}' expired", user);
                }
            },
        );
    }

    fn apply_typing_stop(&self, conversation_id: &ConversationId, user_id: &UserId) {
        self.typing_timers
            .cancel(&(conversation_id.clone(), user_id.clone()));
        self.typing
            .update_if(|map| typing::with_typing(map, conversation_id, user_id, false));
    }

    fn apply_user_status(&self, user_id: &UserId, status: UserStatus) {
        self.conversations
            .update_if(|list| conversation::with_user_status(list, user_id, status));
    }

    // ========================================
    // Teardown
    // ========================================

    /// すべての状態と保留中のタイマーを破棄する
    pub fn clear(&self) {
        self.typing_timers.clear();
        self.selection_seq.fetch_add(1, Ordering::SeqCst);
        self.conversations.set(Vec::new());
        self.selected_id.set(None);
        self.selection_state.set(SelectionState::Unselected);
        self.messages.set(Vec::new());
        self.typing.set(TypingMap::new());
        self.current_user.set(None);
    }

    /// ログアウト時の後始末：状態を破棄して接続を閉じる
    pub fn disconnect(&self) {
        self.clear();
        self.connection.disconnect();
    }
}

impl EventHandler for ConversationStore {
    fn handle(&self, event: &InboundEvent) {
        match event {
            InboundEvent::MessageReceive(d) => self.apply_message(d),
            InboundEvent::MessageDeleted(d) => {
                self.apply_message_deleted(&d.conversation_id, &d.message_id)
            }
            InboundEvent::MessagesRead(d) => {
                self.apply_messages_read(&d.conversation_id, &d.user_id)
            }
            InboundEvent::TypingStart(d) => self.apply_typing_start(&d.conversation_id, &d.user_id),
            InboundEvent::TypingStop(d) => self.apply_typing_stop(&d.conversation_id, &d.user_id),
            InboundEvent::UserOnline(d) => self.apply_user_status(&d.user_id, UserStatus::Online),
            InboundEvent::UserOffline(d) => self.apply_user_status(&d.user_id, UserStatus::Offline),
            InboundEvent::UserStatusUpdate(d) => {
                let status: UserStatus = d.status.into();
                self.apply_user_status(&d.user_id, status)
            }
            _ => {}
        }
    }
}
