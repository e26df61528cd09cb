//! Domain 層
//!
//! エンティティ・値オブジェクト・状態遷移の純粋関数と、
//! 外部（REST API / イベントストリーム）へのインターフェースを定義します。

pub mod conversation;
pub mod entity;
pub mod error;
pub mod event;
pub mod presence;
pub mod request;
pub mod rest;
pub mod signal;
pub mod transport;
pub mod typing;
pub mod value_object;

pub use entity::{
    Conversation, Message, MessageKind, PresenceEntry, PresenceStatus, User, UserStatus,
    UserSummary,
};
pub use error::{ApiError, StorageError};
pub use event::{InboundEvent, OutboundEvent};
pub use presence::PresenceMap;
pub use request::{
    ConversationUpdate, CreateConversationRequest, Credentials, ProfileUpdate, PushKeys,
    PushSubscription, SendMessageRequest,
};
pub use rest::RestApi;
pub use signal::{Computed, Dependency, Signal};
pub use transport::{Connector, TransportEvent, TransportEventKind, TransportHandle};
pub use typing::TypingMap;
pub use value_object::{ConversationId, MessageId, UserId, ValueObjectError};
