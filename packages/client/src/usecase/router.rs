//! Event Router
//!
//! 受信イベントをイベント名ごとの「最新値スロット」に振り分ける。
//! スロットはキューではなく、到着のたびに上書きされる。
//!
//! 状態を持つ消費者（会話ストア・プレゼンス）は [`EventHandler`] として登録し、
//! スロットへの書き込み直後に同期的に呼び出される。これにより、スロットの購読者が
//! 途中の値を取りこぼしても、状態の更新はすべてのイベントに対して行われる。

use std::sync::{Arc, RwLock};

use crate::domain::{
    InboundEvent, Signal,
    event::{
        CallAnsweredData, CallEndedData, CallIncomingData, MessageDeletedData, MessageErrorData,
        MessageReceiveData, MessagesReadData, OnlineUser, RelayedSignal, TypingStartEvent,
        TypingStopEvent, UserOfflineData, UserOnlineData, UserStatusUpdateData,
    },
};

/// 受信イベントを処理する消費者
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &InboundEvent);
}

/// Event Router
#[derive(Default)]
pub struct EventRouter {
    message: Signal<Option<MessageReceiveData>>,
    message_error: Signal<Option<MessageErrorData>>,
    message_deleted: Signal<Option<MessageDeletedData>>,
    typing_start: Signal<Option<TypingStartEvent>>,
    typing_stop: Signal<Option<TypingStopEvent>>,
    user_online: Signal<Option<UserOnlineData>>,
    user_offline: Signal<Option<UserOfflineData>>,
    user_status: Signal<Option<UserStatusUpdateData>>,
    online_users: Signal<Vec<OnlineUser>>,
    messages_read: Signal<Option<MessagesReadData>>,
    call_incoming: Signal<Option<CallIncomingData>>,
    call_answered: Signal<Option<CallAnsweredData>>,
    call_ended: Signal<Option<CallEndedData>>,
    webrtc_offer: Signal<Option<RelayedSignal>>,
    webrtc_answer: Signal<Option<RelayedSignal>>,
    webrtc_ice_candidate: Signal<Option<RelayedSignal>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 消費者を登録する（登録順に呼び出される）
    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handler);
    }

    /// スロットを上書きし、登録済みの消費者に渡す
    pub fn route(&self, event: InboundEvent) {
        tracing::trace!("Routing '{}'", event.name());

        match &event {
            InboundEvent::MessageReceive(d) => self.message.set(Some(d.clone())),
            InboundEvent::MessageError(d) => {
                tracing::warn!("Server rejected a message: {}", d.message);
                self.message_error.set(Some(d.clone()))
            }
            InboundEvent::MessageDeleted(d) => self.message_deleted.set(Some(d.clone())),
            InboundEvent::TypingStart(d) => self.typing_start.set(Some(d.clone())),
            InboundEvent::TypingStop(d) => self.typing_stop.set(Some(d.clone())),
            InboundEvent::UserOnline(d) => self.user_online.set(Some(d.clone())),
            InboundEvent::UserOffline(d) => self.user_offline.set(Some(d.clone())),
            InboundEvent::UserStatusUpdate(d) => self.user_status.set(Some(d.clone())),
            InboundEvent::OnlineUsersList(users) => self.online_users.set(users.clone()),
            InboundEvent::MessagesRead(d) => self.messages_read.set(Some(d.clone())),
            InboundEvent::CallIncoming(d) => self.call_incoming.set(Some(d.clone())),
            InboundEvent::CallAnswered(d) => self.call_answered.set(Some(d.clone())),
            InboundEvent::CallEnded(d) => self.call_ended.set(Some(d.clone())),
            InboundEvent::WebrtcOffer(d) => self.webrtc_offer.set(Some(d.clone())),
            InboundEvent::WebrtcAnswer(d) => self.webrtc_answer.set(Some(d.clone())),
            InboundEvent::WebrtcIceCandidate(d) => self.webrtc_ice_candidate.set(Some(d.clone())),
        }

        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for handler in handlers {
            handler.handle(&event);
        }
    }

    /// すべてのスロットを空にする（ログアウト時）
    pub fn clear_data(&self) {
        self.message.set(None);
        self.message_error.set(None);
        self.message_deleted.set(None);
        self.typing_start.set(None);
        self.typing_stop.set(None);
        self.user_online.set(None);
        self.user_offline.set(None);
        self.user_status.set(None);
        self.online_users.set(Vec::new());
        self.messages_read.set(None);
        self.call_incoming.set(None);
        self.call_answered.set(None);
        self.call_ended.set(None);
        self.webrtc_offer.set(None);
        self.webrtc_answer.set(None);
        self.webrtc_ice_candidate.set(None);
    }

    // ========================================
    // Slots
    // ========================================

    pub fn message(&self) -> Signal<Option<MessageReceiveData>> {
        self.message.clone()
    }

    pub fn message_error(&self) -> Signal<Option<MessageErrorData>> {
        self.message_error.clone()
    }

    pub fn message_deleted(&self) -> Signal<Option<MessageDeletedData>> {
        self.message_deleted.clone()
    }

    pub fn typing_start(&self) -> Signal<Option<TypingStartEvent>> {
        self.typing_start.clone()
    }

    pub fn typing_stop(&self) -> Signal<Option<TypingStopEvent>> {
        self.typing_stop.clone()
    }

    pub fn user_online(&self) -> Signal<Option<UserOnlineData>> {
        self.user_online.clone()
    }

    pub fn user_offline(&self) -> Signal<Option<UserOfflineData>> {
        self.user_offline.clone()
    }

    pub fn user_status(&self) -> Signal<Option<UserStatusUpdateData>> {
        self.user_status.clone()
    }

    pub fn online_users(&self) -> Signal<Vec<OnlineUser>> {
        self.online_users.clone()
    }

    pub fn messages_read(&self) -> Signal<Option<MessagesReadData>> {
        self.messages_read.clone()
    }

    pub fn call_incoming(&self) -> Signal<Option<CallIncomingData>> {
        self.call_incoming.clone()
    }

    pub fn call_answered(&self) -> Signal<Option<CallAnsweredData>> {
        self.call_answered.clone()
    }

    pub fn call_ended(&self) -> Signal<Option<CallEndedData>> {
        self.call_ended.clone()
    }

    pub fn webrtc_offer(&self) -> Signal<Option<RelayedSignal>> {
        self.webrtc_offer.clone()
    }

    pub fn webrtc_answer(&self) -> Signal<Option<RelayedSignal>> {
        self.webrtc_answer.clone()
    }

    pub fn webrtc_ice_candidate(&self) -> Signal<Option<RelayedSignal>> {
        self.webrtc_ice_candidate.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    fn typing_start(user: &str) -> InboundEvent {
        InboundEvent::TypingStart(
            serde_json::from_value(json!({
                "userId": user, "username": user, "conversationId": "c1"
            }))
            .unwrap(),
        )
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
    }

    impl EventHandler for Recorder {
        fn handle(&self, event: &InboundEvent) {
            self.seen.lock().unwrap().push(event.name());
        }
    }

    #[test]
    fn test_slot_keeps_only_latest_value() {
        // テスト項目: スロットは最新の値だけを保持する（キューではない）
        // given (前提条件):
        let router = EventRouter::new();
        let slot = router.typing_start();

        // when (操作):
        router.route(typing_start("alice"));
        router.route(typing_start("bob"));

        // then (期待する結果):
        assert_eq!(slot.get().unwrap().user_id.as_str(), "bob");
        assert!(router.typing_stop().get().is_none());
    }

    #[test]
    fn test_handlers_see_every_event_in_order() {
        // テスト項目: 登録した消費者にはすべてのイベントが順番に届く
        // given (前提条件):
        let router = EventRouter::new();
        let recorder = Arc::new(Recorder::default());
        router.register(Arc::clone(&recorder) as Arc<dyn EventHandler>);

        // when (操作):
        router.route(typing_start("alice"));
        router.route(InboundEvent::OnlineUsersList(Vec::new()));
        router.route(typing_start("bob"));

        // then (期待する結果):
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["typing:start", "users:online_list", "typing:start"]
        );
    }

    #[test]
    fn test_clear_data_empties_every_slot() {
        // テスト項目: clear_data ですべてのスロットが空になる
        // given (前提条件):
        let router = EventRouter::new();
        router.route(typing_start("alice"));
        router.route(InboundEvent::OnlineUsersList(
            serde_json::from_value(json!([{"userId": "u1"}])).unwrap(),
        ));

        // when (操作):
        router.clear_data();

        // then (期待する結果):
        assert!(router.typing_start().get().is_none());
        assert!(router.online_users().get().is_empty());
    }
}
