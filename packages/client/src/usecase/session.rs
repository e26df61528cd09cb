//! Session context
//!
//! 起動時に 1 つだけ作り、すべてのサービスを所有する。
//!
//! - transport からのイベントを 1 本のタスクで受け取り、状態変化は Connection Manager に、
//!   受信イベントは Event Router に渡す
//! - Event Router には会話ストアとプレゼンスを消費者として登録する
//! - トークンが消えたら（ログアウト・無効なトークン）状態をすべて破棄する

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    config::ClientConfig,
    domain::{ApiError, Connector, RestApi, TransportEvent, TransportEventKind},
    error::ClientError,
    infrastructure::{HttpRestApi, LocalStore, WebSocketConnector},
    usecase::{
        auth::{AuthService, TokenStore},
        connection::ConnectionManager,
        presence::PresenceTracker,
        profile::ProfileService,
        push::PushService,
        router::{EventHandler, EventRouter},
        store::ConversationStore,
        typing::TypingDebouncer,
    },
};

/// Services owned by the session; cheap to clone into tasks.
#[derive(Clone)]
struct Services {
    auth: AuthService,
    connection: ConnectionManager,
    router: Arc<EventRouter>,
    store: ConversationStore,
    presence: PresenceTracker,
    profile: ProfileService,
    push: PushService,
    typing: TypingDebouncer,
}

impl Services {
    /// Drop every piece of session state. Safe to call repeatedly.
    fn teardown(&self) {
        self.typing.force_stop();
        self.connection.stop_monitoring();
        self.store.disconnect();
        self.router.clear_data();
        self.presence.clear();
    }
}

pub struct Session {
    services: Services,
    dispatch: JoinHandle<()>,
    token_watch: JoinHandle<()>,
}

impl Session {
    /// Build the production session: file-backed storage, reqwest and tokio-tungstenite.
    pub fn open(config: &ClientConfig) -> Result<Self, ClientError> {
        let storage = Arc::new(LocalStore::open(config.store_path())?);
        let tokens = TokenStore::load(Arc::clone(&storage));
        let api = Arc::new(HttpRestApi::new(config.api_url.clone(), tokens.token()));
        let connector = Arc::new(WebSocketConnector::new(
            config.server_url.clone(),
            config.reconnect,
        ));
        Ok(Self::new(config, storage, tokens, api, connector))
    }

    /// Must be called inside a tokio runtime.
    pub fn new(
        config: &ClientConfig,
        storage: Arc<LocalStore>,
        tokens: TokenStore,
        api: Arc<dyn RestApi>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connection = ConnectionManager::new(
            connector,
            tokens.token(),
            events_tx,
            config.timing.health_check,
        );

        let profile = ProfileService::new(Arc::clone(&api), Default::default());
        let current_user = profile.current_user();
        let store = ConversationStore::new(
            Arc::clone(&api),
            connection.clone(),
            current_user.clone(),
            config.timing.typing_expiry,
            config.page_size,
        );
        let presence = PresenceTracker::new();

        let router = Arc::new(EventRouter::new());
        router.register(Arc::new(store.clone()) as Arc<dyn EventHandler>);
        router.register(Arc::new(presence.clone()) as Arc<dyn EventHandler>);

        let services = Services {
            auth: AuthService::new(Arc::clone(&api), tokens),
            typing: TypingDebouncer::new(
                connection.clone(),
                current_user,
                config.timing.typing_idle,
            ),
            push: PushService::new(api, storage),
            connection,
            router,
            store,
            presence,
            profile,
        };

        let dispatch = tokio::spawn(dispatch_loop(
            events_rx,
            services.connection.clone(),
            Arc::clone(&services.router),
        ));
        let token_watch = tokio::spawn(watch_token(services.clone()));

        Self {
            services,
            dispatch,
            token_watch,
        }
    }

    pub fn auth(&self) -> &AuthService {
        &self.services.auth
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.services.connection
    }

    pub fn router(&self) -> &EventRouter {
        &self.services.router
    }

    pub fn store(&self) -> &ConversationStore {
        &self.services.store
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.services.presence
    }

    pub fn profile(&self) -> &ProfileService {
        &self.services.profile
    }

    pub fn push(&self) -> &PushService {
        &self.services.push
    }

    pub fn typing(&self) -> &TypingDebouncer {
        &self.services.typing
    }

    /// Open the messaging view: connect, start the health check, and load
    /// the profile and conversation list.
    pub async fn enter_messaging(&self) -> Result<(), ClientError> {
        if !self.services.auth.tokens().is_authenticated() {
            return Err(ApiError::NotAuthenticated.into());
        }
        self.services.connection.connect();
        self.services.connection.start_monitoring();

        self.services.profile.load_profile().await?;
        self.services.store.load_conversations().await?;
        Ok(())
    }

    /// Close the messaging view. The connection itself stays open.
    pub fn leave_messaging(&self) {
        self.services.typing.force_stop();
        self.services.connection.stop_monitoring();
    }

    pub async fn logout(&self) {
        self.services.teardown();
        self.services.auth.logout().await;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispatch.abort();
        self.token_watch.abort();
        self.services.connection.stop_monitoring();
        self.services.connection.disconnect();
    }
}

async fn dispatch_loop(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    connection: ConnectionManager,
    router: Arc<EventRouter>,
) {
    while let Some(event) = events.recv().await {
        match event.kind {
            TransportEventKind::Inbound(inbound) => {
                if connection.is_current_transport(event.transport_id) {
                    router.route(inbound);
                }
            }
            _ => connection.handle_transport_event(&event),
        }
    }
    tracing::debug!("Transport event channel closed");
}

async fn watch_token(services: Services) {
    let token = services.auth.tokens().token();
    let mut rx = token.subscribe();
    while rx.changed().await.is_ok() {
        let cleared = rx.borrow_and_update().is_none();
        if cleared {
            tracing::info!("Session token cleared; tearing down session state");
            services.teardown();
            if let Err(e) = services.auth.tokens().clear() {
                tracing::warn!("Failed to remove stored token: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::domain::{
        ConversationId, InboundEvent, conversation::fixtures::direct, rest::MockRestApi,
    };
    use crate::usecase::connection::fake::FakeConnector;

    fn session(api: MockRestApi, token: Option<&str>) -> (Session, Arc<FakeConnector>) {
        let storage = Arc::new(LocalStore::in_memory());
        let tokens = TokenStore::load(Arc::clone(&storage));
        if let Some(token) = token {
            tokens.set(token.to_string()).unwrap();
        }
        let connector = Arc::new(FakeConnector::default());
        let session = Session::new(
            &ClientConfig::default(),
            storage,
            tokens,
            Arc::new(api),
            Arc::clone(&connector) as Arc<dyn Connector>,
        );
        (session, connector)
    }

    fn logged_in_api() -> MockRestApi {
        let mut api = MockRestApi::new();
        api.expect_get_profile().returning(|| {
            Ok(serde_json::from_value(json!({"_id": "me", "username": "me"})).unwrap())
        });
        api.expect_get_conversations()
            .returning(|| Ok(vec![direct("c1", "bob")]));
        api
    }

    fn receive(id: &str) -> TransportEventKind {
        TransportEventKind::Inbound(InboundEvent::MessageReceive(
            serde_json::from_value(json!({
                "_id": id,
                "senderId": "bob",
                "conversationId": "c1",
                "content": "hi",
                "timestamp": "2024-01-02T00:00:00Z"
            }))
            .unwrap(),
        ))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_events_reach_store_and_router() {
        // テスト項目: transport からのイベントが Connection Manager・Router・会話ストアに届く
        // given (前提条件):
        let (session, connector) = session(logged_in_api(), Some("tok"));
        session.enter_messaging().await.unwrap();
        connector.set_connected(0, true);

        // when (操作):
        connector.push(0, TransportEventKind::Connected);
        connector.push(0, receive("m1"));
        settle().await;

        // then (期待する結果):
        assert_eq!(connector.open_count(), 1);
        assert_eq!(connector.opened.lock().unwrap()[0].1, "tok");
        assert!(session.connection().status().get());
        assert!(session.connection().is_monitoring());
        assert_eq!(session.store().total_unread(), 1);
        assert_eq!(
            session.router().message().get().unwrap().id.as_str(),
            "m1"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_messaging_requires_token() {
        // テスト項目: トークンが無い状態では接続せずにエラーを返す
        // given (前提条件):
        let (session, connector) = session(MockRestApi::new(), None);

        // when (操作):
        let result = session.enter_messaging().await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::Api(ApiError::NotAuthenticated))
        ));
        assert_eq!(connector.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_token_tears_down_session_state() {
        // テスト項目: トークンが外部から破棄されると状態・スロット・接続がすべて破棄される
        // given (前提条件):
        let (session, connector) = session(logged_in_api(), Some("tok"));
        session.enter_messaging().await.unwrap();
        connector.set_connected(0, true);
        connector.push(0, TransportEventKind::Connected);
        connector.push(0, receive("m1"));
        settle().await;

        // when (操作):
        session.auth().tokens().token().set(None);
        settle().await;

        // then (期待する結果):
        assert!(session.store().conversations().get().is_empty());
        assert!(session.store().current_user().get().is_none());
        assert!(session.router().message().get().is_none());
        assert!(!session.connection().is_connected());
        assert!(!session.connection().is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_clears_state_then_calls_server() {
        // テスト項目: ログアウトで状態を破棄し、トークンを消してからサーバーに通知する
        // given (前提条件):
        let mut api = logged_in_api();
        api.expect_logout().times(1).returning(|| Ok(()));
        let (session, connector) = session(api, Some("tok"));
        session.enter_messaging().await.unwrap();
        connector.set_connected(0, true);
        connector.push(0, TransportEventKind::Connected);
        settle().await;

        // when (操作):
        session.logout().await;
        settle().await;

        // then (期待する結果):
        assert!(!session.auth().tokens().is_authenticated());
        assert!(!session.connection().status().get());
        assert_eq!(session.store().selected_id().get(), None::<ConversationId>);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_from_replaced_transport_are_not_routed() {
        // テスト項目: 置き換え済みの transport から届いた受信イベントはルーティングされない
        // given (前提条件):
        let (session, connector) = session(logged_in_api(), Some("tok"));
        session.enter_messaging().await.unwrap();
        session.connection().connect();

        // when (操作):
        connector.push(0, receive("m1"));
        settle().await;

        // then (期待する結果):
        assert_eq!(connector.open_count(), 2);
        assert!(session.router().message().get().is_none());
        assert_eq!(session.store().total_unread(), 0);
    }
}
