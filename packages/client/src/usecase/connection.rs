//! Connection Manager
//!
//! イベントストリームへの接続を 1 本だけ保持し、接続状態を公開する。
//!
//! - `connect()` は冪等：接続中・ハンドシェイク中・再接続中の transport はそのまま、
//!   接続を諦めた transport は閉じて開き直す
//! - 送信は接続中のみ。未接続の間の送信は破棄してログに残す（キューイング・再送しない）
//! - 接続状態は transport から届くイベントで更新し、置き換え済みの transport からのイベントは無視する
//! - ヘルスチェック（`start_monitoring`）はトークンがある間、未接続なら再接続を試みる

use std::{
    sync::{
        Arc, Mutex, MutexGuard, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::mpsc, task::JoinHandle};

use crate::domain::{
    ConversationId, OutboundEvent, PresenceStatus, Signal, TransportEvent, TransportEventKind,
    TransportHandle,
    event::{
        CallAnswerData, CallEndData, CallInitiateData, MarkReadData, MessageDeleteData,
        MessageSendData, SignalData, StatusUpdateData, TypingStartData, TypingStopData,
    },
    transport::Connector,
};

struct ConnectionInner {
    connector: Arc<dyn Connector>,
    token: Signal<Option<String>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    transport: Mutex<Option<TransportHandle>>,
    next_transport_id: AtomicU64,
    status: Signal<bool>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    health_check: Duration,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        let monitor = self
            .monitor
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(task) = monitor.take() {
            task.abort();
        }
    }
}

/// Connection Manager
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ConnectionInner>,
}

impl ConnectionManager {
    /// `events` は transport のイベントを受け取るチャネル。受信側は Session が回す。
    pub fn new(
        connector: Arc<dyn Connector>,
        token: Signal<Option<String>>,
        events: mpsc::UnboundedSender<TransportEvent>,
        health_check: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                connector,
                token,
                events,
                transport: Mutex::new(None),
                next_transport_id: AtomicU64::new(0),
                status: Signal::new(false),
                monitor: Mutex::new(None),
                health_check,
            }),
        }
    }

    fn transport(&self) -> MutexGuard<'_, Option<TransportHandle>> {
        self.inner
            .transport
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn monitor(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 接続を開く（トークンが無ければ何もしない）
    pub fn connect(&self) {
        let Some(token) = self.inner.token.get().filter(|t| !t.is_empty()) else {
            tracing::warn!("No session token; not connecting");
            return;
        };

        let mut transport = self.transport();
        if let Some(current) = transport.as_mut() {
            if current.is_active() {
                tracing::debug!("Transport #{} is connected or connecting", current.id());
                return;
            }
            tracing::debug!("Replacing stale transport #{}", current.id());
            current.close();
        }

        let id = self.inner.next_transport_id.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Opening transport #{}", id);
        *transport = Some(
            self.inner
                .connector
                .open(id, &token, self.inner.events.clone()),
        );
    }

    /// 接続を閉じる（未接続でも安全）
    pub fn disconnect(&self) {
        if let Some(mut transport) = self.transport().take() {
            tracing::info!("Closing transport #{}", transport.id());
            transport.close();
        }
        self.inner.status.update_if(|connected| connected.then_some(false));
    }

    /// transport の接続フラグを直接参照する
    pub fn is_connected(&self) -> bool {
        self.transport()
            .as_ref()
            .is_some_and(|transport| transport.is_connected())
    }

    /// イベントの送り主がいま保持している transport か
    pub fn is_current_transport(&self, transport_id: u64) -> bool {
        self.transport()
            .as_ref()
            .is_some_and(|transport| transport.id() == transport_id)
    }

    /// 接続状態（observable）
    pub fn status(&self) -> Signal<bool> {
        self.inner.status.clone()
    }

    /// transport から届いた状態変化を反映する
    pub fn handle_transport_event(&self, event: &TransportEvent) {
        if !self.is_current_transport(event.transport_id) {
            tracing::debug!(
                "Ignoring event from replaced transport #{}",
                event.transport_id
            );
            return;
        }

        let connected = match &event.kind {
            TransportEventKind::Connected | TransportEventKind::Reconnected { .. } => true,
            TransportEventKind::Disconnected { .. }
            | TransportEventKind::ConnectError { .. }
            | TransportEventKind::ReconnectFailed => false,
            TransportEventKind::Inbound(_) => return,
        };
        if self
            .inner
            .status
            .update_if(|current| (*current != connected).then_some(connected))
        {
            tracing::info!("Connection status: {}", if connected { "online" } else { "offline" });
        }
    }

    /// 送信（未接続なら破棄）
    pub fn emit(&self, event: OutboundEvent) -> bool {
        let name = event.name();
        let sent = self
            .transport()
            .as_ref()
            .is_some_and(|transport| transport.emit(event));
        if !sent {
            tracing::warn!("Dropping '{}': not connected", name);
        }
        sent
    }

    // ========================================
    // Outbound helpers
    // ========================================

    pub fn send_message(&self, message: MessageSendData) -> bool {
        self.emit(OutboundEvent::MessageSend(message))
    }

    pub fn delete_message(&self, data: MessageDeleteData) -> bool {
        self.emit(OutboundEvent::MessageDelete(data))
    }

    pub fn join_conversation(&self, conversation_id: ConversationId) -> bool {
        self.emit(OutboundEvent::ConversationJoin(conversation_id))
    }

    pub fn leave_conversation(&self, conversation_id: ConversationId) -> bool {
        self.emit(OutboundEvent::ConversationLeave(conversation_id))
    }

    pub fn start_typing(&self, conversation_id: ConversationId, username: String) -> bool {
        self.emit(OutboundEvent::TypingStart(TypingStartData {
            conversation_id,
            username,
        }))
    }

    pub fn stop_typing(&self, conversation_id: ConversationId) -> bool {
        self.emit(OutboundEvent::TypingStop(TypingStopData { conversation_id }))
    }

    pub fn mark_messages_read(&self, conversation_id: ConversationId) -> bool {
        self.emit(OutboundEvent::MessagesMarkRead(MarkReadData { conversation_id }))
    }

    pub fn update_status(&self, status: PresenceStatus) -> bool {
        self.emit(OutboundEvent::StatusUpdate(StatusUpdateData { status }))
    }

    pub fn request_online_users(&self) -> bool {
        self.emit(OutboundEvent::UsersGetOnline)
    }

    pub fn initiate_call(&self, data: CallInitiateData) -> bool {
        self.emit(OutboundEvent::CallInitiate(data))
    }

    pub fn answer_call(&self, data: CallAnswerData) -> bool {
        self.emit(OutboundEvent::CallAnswer(data))
    }

    pub fn end_call(&self, data: CallEndData) -> bool {
        self.emit(OutboundEvent::CallEnd(data))
    }

    pub fn send_webrtc_offer(&self, data: SignalData) -> bool {
        self.emit(OutboundEvent::WebrtcOffer(data))
    }

    pub fn send_webrtc_answer(&self, data: SignalData) -> bool {
        self.emit(OutboundEvent::WebrtcAnswer(data))
    }

    pub fn send_ice_candidate(&self, data: SignalData) -> bool {
        self.emit(OutboundEvent::WebrtcIceCandidate(data))
    }

    // ========================================
    // Health check
    // ========================================

    /// 定期的に接続を確認し、トークンがあるのに未接続なら `connect()` する
    pub fn start_monitoring(&self) {
        let mut monitor = self.monitor();
        if monitor.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let weak: Weak<ConnectionInner> = Arc::downgrade(&self.inner);
        let period = self.inner.health_check;
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let manager = ConnectionManager { inner };
                let has_token = manager.inner.token.with(|t| t.is_some());
                if has_token && !manager.is_connected() {
                    tracing::info!("Health check: not connected, reconnecting");
                    manager.connect();
                }
            }
        }));
        tracing::debug!("Connection monitoring started ({:?})", period);
    }

    pub fn stop_monitoring(&self) {
        if let Some(task) = self.monitor().take() {
            task.abort();
            tracing::debug!("Connection monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
