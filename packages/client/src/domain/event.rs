//! Domain Event
//!
//! イベントストリーム上で送受信されるイベントの定義。
//! イベント名と JSON への変換は `infrastructure::dto::websocket` が担当する。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    entity::{Message, MessageKind, PresenceStatus, UserSummary, deserialize_user_ref},
    value_object::{ConversationId, MessageId, UserId},
};

/// イベント名
pub mod names {
    pub const CONVERSATION_JOIN: &str = "conversation:join";
    pub const CONVERSATION_LEAVE: &str = "conversation:leave";

    pub const MESSAGE_SEND: &str = "message:send";
    pub const MESSAGE_RECEIVE: &str = "message:receive";
    pub const MESSAGE_ERROR: &str = "message:error";
    pub const MESSAGE_DELETE: &str = "message:delete";
    pub const MESSAGE_DELETED: &str = "message:deleted";

    pub const TYPING_START: &str = "typing:start";
    pub const TYPING_STOP: &str = "typing:stop";

    pub const USER_ONLINE: &str = "user:online";
    pub const USER_OFFLINE: &str = "user:offline";
    pub const STATUS_UPDATE: &str = "status:update";
    pub const USER_STATUS_UPDATE: &str = "user:status_update";
    pub const USERS_GET_ONLINE: &str = "users:get_online";
    pub const USERS_ONLINE_LIST: &str = "users:online_list";

    pub const MESSAGES_MARK_READ: &str = "messages:mark_read";
    pub const MESSAGES_READ: &str = "messages:read";

    pub const CALL_INITIATE: &str = "call:initiate";
    pub const CALL_INCOMING: &str = "call:incoming";
    pub const CALL_ANSWER: &str = "call:answer";
    pub const CALL_ANSWERED: &str = "call:answered";
    pub const CALL_END: &str = "call:end";
    pub const CALL_ENDED: &str = "call:ended";

    pub const WEBRTC_OFFER: &str = "webrtc:offer";
    pub const WEBRTC_ANSWER: &str = "webrtc:answer";
    pub const WEBRTC_ICE_CANDIDATE: &str = "webrtc:ice_candidate";
}

// ========================================
// Outbound payloads
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendData {
    pub conversation_id: ConversationId,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeleteData {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStartData {
    pub conversation_id: ConversationId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStopData {
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadData {
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateData {
    pub status: PresenceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Voice,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInitiateData {
    pub conversation_id: ConversationId,
    #[serde(rename = "type")]
    pub kind: CallKind,
    pub participants: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnswerData {
    pub conversation_id: ConversationId,
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndData {
    pub conversation_id: ConversationId,
}

/// WebRTC シグナリング（SDP / ICE の中身は解釈せずに中継する）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalData {
    pub conversation_id: ConversationId,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// 送信イベント
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    MessageSend(MessageSendData),
    MessageDelete(MessageDeleteData),
    ConversationJoin(ConversationId),
    ConversationLeave(ConversationId),
    TypingStart(TypingStartData),
    TypingStop(TypingStopData),
    MessagesMarkRead(MarkReadData),
    StatusUpdate(StatusUpdateData),
    UsersGetOnline,
    CallInitiate(CallInitiateData),
    CallAnswer(CallAnswerData),
    CallEnd(CallEndData),
    WebrtcOffer(SignalData),
    WebrtcAnswer(SignalData),
    WebrtcIceCandidate(SignalData),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::MessageSend(_) => names::MESSAGE_SEND,
            OutboundEvent::MessageDelete(_) => names::MESSAGE_DELETE,
            OutboundEvent::ConversationJoin(_) => names::CONVERSATION_JOIN,
            OutboundEvent::ConversationLeave(_) => names::CONVERSATION_LEAVE,
            OutboundEvent::TypingStart(_) => names::TYPING_START,
            OutboundEvent::TypingStop(_) => names::TYPING_STOP,
            OutboundEvent::MessagesMarkRead(_) => names::MESSAGES_MARK_READ,
            OutboundEvent::StatusUpdate(_) => names::STATUS_UPDATE,
            OutboundEvent::UsersGetOnline => names::USERS_GET_ONLINE,
            OutboundEvent::CallInitiate(_) => names::CALL_INITIATE,
            OutboundEvent::CallAnswer(_) => names::CALL_ANSWER,
            OutboundEvent::CallEnd(_) => names::CALL_END,
            OutboundEvent::WebrtcOffer(_) => names::WEBRTC_OFFER,
            OutboundEvent::WebrtcAnswer(_) => names::WEBRTC_ANSWER,
            OutboundEvent::WebrtcIceCandidate(_) => names::WEBRTC_ICE_CANDIDATE,
        }
    }
}

// ========================================
// Inbound payloads
// ========================================

/// `message:receive`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceiveData {
    #[serde(rename = "_id", alias = "id")]
    pub id: MessageId,
    #[serde(rename = "senderId", deserialize_with = "deserialize_user_ref")]
    pub sender: UserSummary,
    pub conversation_id: ConversationId,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

impl From<MessageReceiveData> for Message {
    fn from(data: MessageReceiveData) -> Self {
        Self {
            id: data.id,
            conversation_id: data.conversation_id,
            sender: data.sender,
            content: data.content,
            timestamp: data.timestamp,
            kind: data.kind,
            read_by: Vec::new(),
            reply_to: data.reply_to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageErrorData {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedData {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStartEvent {
    pub user_id: UserId,
    #[serde(default)]
    pub username: String,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStopEvent {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOnlineData {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOfflineData {
    pub user_id: UserId,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusUpdateData {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub timestamp: DateTime<Utc>,
}

/// `users:online_list` の要素
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub last_seen: DateTime<Utc>,
    #[serde(default = "default_online")]
    pub status: PresenceStatus,
}

fn default_online() -> PresenceStatus {
    PresenceStatus::Online
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadData {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallIncomingData {
    pub caller_id: UserId,
    #[serde(default)]
    pub caller_name: String,
    pub conversation_id: ConversationId,
    #[serde(rename = "type")]
    pub kind: CallKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnsweredData {
    pub user_id: UserId,
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndedData {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
}

/// Relayed WebRTC signal: opaque payload plus the originating user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedSignal {
    pub sender_id: UserId,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// 受信イベント
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    MessageReceive(MessageReceiveData),
    MessageError(MessageErrorData),
    MessageDeleted(MessageDeletedData),
    TypingStart(TypingStartEvent),
    TypingStop(TypingStopEvent),
    UserOnline(UserOnlineData),
    UserOffline(UserOfflineData),
    UserStatusUpdate(UserStatusUpdateData),
    OnlineUsersList(Vec<OnlineUser>),
    MessagesRead(MessagesReadData),
    CallIncoming(CallIncomingData),
    CallAnswered(CallAnsweredData),
    CallEnded(CallEndedData),
    WebrtcOffer(RelayedSignal),
    WebrtcAnswer(RelayedSignal),
    WebrtcIceCandidate(RelayedSignal),
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::MessageReceive(_) => names::MESSAGE_RECEIVE,
            InboundEvent::MessageError(_) => names::MESSAGE_ERROR,
            InboundEvent::MessageDeleted(_) => names::MESSAGE_DELETED,
            InboundEvent::TypingStart(_) => names::TYPING_START,
            InboundEvent::TypingStop(_) => names::TYPING_STOP,
            InboundEvent::UserOnline(_) => names::USER_ONLINE,
            InboundEvent::UserOffline(_) => names::USER_OFFLINE,
            InboundEvent::UserStatusUpdate(_) => names::USER_STATUS_UPDATE,
            InboundEvent::OnlineUsersList(_) => names::USERS_ONLINE_LIST,
            InboundEvent::MessagesRead(_) => names::MESSAGES_READ,
            InboundEvent::CallIncoming(_) => names::CALL_INCOMING,
            InboundEvent::CallAnswered(_) => names::CALL_ANSWERED,
            InboundEvent::CallEnded(_) => names::CALL_ENDED,
            InboundEvent::WebrtcOffer(_) => names::WEBRTC_OFFER,
            InboundEvent::WebrtcAnswer(_) => names::WEBRTC_ANSWER,
            InboundEvent::WebrtcIceCandidate(_) => names::WEBRTC_ICE_CANDIDATE,
        }
    }
}
