//! UseCase 層
//!
//! 接続管理・イベントの振り分け・会話状態・プレゼンス・入力中表示など、
//! クライアントの同期ロジックを実装します。すべてのサービスは [`session::Session`] が所有します。

pub mod auth;
pub mod connection;
pub mod presence;
pub mod profile;
pub mod push;
pub mod router;
pub mod session;
pub mod store;
pub mod timer;
pub mod typing;

pub use auth::{AuthService, TokenStore};
pub use connection::ConnectionManager;
pub use presence::PresenceTracker;
pub use profile::ProfileService;
pub use push::{NotificationPreferences, PushPayload, PushService};
pub use router::{EventHandler, EventRouter};
pub use session::Session;
pub use store::{ConversationStore, SelectionState};
pub use timer::TimerSet;
pub use typing::TypingDebouncer;
