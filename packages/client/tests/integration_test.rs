//! Integration tests against an in-process fake backend (axum REST + WebSocket).

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use tayori_client::{
    config::ClientConfig,
    domain::{ConversationId, UserId},
    usecase::{SelectionState, Session},
};

const TOKEN: &str = "tok-alice";

/// Shared state of the fake backend
#[derive(Clone)]
struct Backend {
    /// Frames received from the client, in order
    received: Arc<Mutex<Vec<Value>>>,
    /// Frames to push to every connected client
    push: broadcast::Sender<String>,
    /// Drops every open socket when signalled
    kick: broadcast::Sender<()>,
    /// Accepted WebSocket upgrades
    connections: Arc<AtomicUsize>,
}

impl Backend {
    fn new() -> Self {
        let (push, _) = broadcast::channel(16);
        let (kick, _) = broadcast::channel(4);
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            push,
            kick,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn drop_connections(&self) {
        let _ = self.kick.send(());
    }

    fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn received_events(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter_map(|frame| frame["event"].as_str().map(str::to_string))
            .collect()
    }

    fn send(&self, event: &str, data: Value) {
        let frame = json!({"event": event, "data": data}).to_string();
        let _ = self.push.send(frame);
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

fn invalid_token() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "message": "Invalid token."})),
    )
        .into_response()
}

fn ok(data: Value) -> Response {
    Json(json!({"success": true, "data": data})).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["username"] == "alice" && body["password"] == "pw" {
        ok(json!({"token": TOKEN}))
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "bad credentials"})),
        )
            .into_response()
    }
}

async fn profile(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return invalid_token();
    }
    ok(json!({"_id": "me", "username": "alice", "displayName": "Alice"}))
}

async fn conversations(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return invalid_token();
    }
    ok(json!([{
        "_id": "c1",
        "participants": [
            {"_id": "me", "username": "alice"},
            {"_id": "bob", "username": "bob"}
        ],
        "isGroup": false,
        "unreadCount": 2,
        "otherParticipant": {"_id": "bob", "username": "bob"}
    }]))
}

async fn messages(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return invalid_token();
    }
    ok(json!([{
        "_id": "m1",
        "conversationId": "c1",
        "senderId": "bob",
        "content": "hello",
        "type": "text",
        "timestamp": "2024-01-01T00:00:00Z"
    }]))
}

async fn mark_read(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return invalid_token();
    }
    Json(json!({"success": true, "message": "marked"})).into_response()
}

async fn logout() -> Response {
    Json(json!({"success": true})).into_response()
}

async fn websocket(
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(backend): State<Backend>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    // subscribe before answering the upgrade; the client acts as soon as it sees Connected
    backend.connections.fetch_add(1, Ordering::SeqCst);
    let push = backend.push.subscribe();
    let kick = backend.kick.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, backend, push, kick))
}

async fn handle_socket(
    socket: WebSocket,
    backend: Backend,
    mut push: broadcast::Receiver<String>,
    mut kick: broadcast::Receiver<()>,
) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                        backend.received.lock().unwrap().push(value);
                    }
                }
                Some(Ok(_)) => {}
                _ => break,
            },
            Ok(frame) = push.recv() => {
                if sender.send(WsMessage::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            Ok(()) = kick.recv() => break,
        }
    }
}

async fn start_backend() -> (Backend, ClientConfig) {
    let backend = Backend::new();
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", delete(logout))
        .route("/api/auth/profile", get(profile))
        .route("/api/conversations", get(conversations))
        .route("/api/conversations/{id}/messages", get(messages))
        .route("/api/conversations/{id}/messages/read", patch(mark_read))
        .route("/ws", get(websocket))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ClientConfig {
        server_url: format!("ws://{}/ws", addr),
        api_url: format!("http://{}/api", addr),
        data_dir: temp_dir(),
        ..ClientConfig::default()
    };
    (backend, config)
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("tayori-it-{}", uuid::Uuid::new_v4()))
}

/// Poll `condition` until it holds or the timeout elapses
async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test]
async fn test_login_select_and_receive_over_real_transport() {
    // テスト項目: ログインから会話の選択、リアルタイム受信までが実際の WebSocket / HTTP で動作する
    // given (前提条件):
    let (backend, config) = start_backend().await;
    let session = Session::open(&config).unwrap();
    let c1 = ConversationId::new("c1").unwrap();

    // when (操作):
    session.auth().login("alice", "pw").await.unwrap();
    session.enter_messaging().await.unwrap();
    let connected = wait_until(Duration::from_secs(3), || session.connection().is_connected()).await;
    session
        .store()
        .select_conversation(Some(c1.clone()))
        .await
        .unwrap();

    backend.send(
        "message:receive",
        json!({
            "_id": "m2",
            "senderId": {"_id": "bob", "username": "bob"},
            "conversationId": "c1",
            "content": "are you there?",
            "type": "text",
            "timestamp": "2024-01-01T00:01:00Z"
        }),
    );
    backend.send(
        "typing:start",
        json!({"userId": "bob", "username": "bob", "conversationId": "c1"}),
    );
    let received = wait_until(Duration::from_secs(3), || {
        session.store().messages().with(|list| list.len()) == 2
    })
    .await;
    let typing = wait_until(Duration::from_secs(3), || {
        session.store().typing_users(&c1) == vec![UserId::new("bob").unwrap()]
    })
    .await;

    // then (期待する結果):
    assert!(connected, "client should connect to the event stream");
    assert!(session.connection().status().get());
    assert_eq!(
        session.store().selection_state().get(),
        SelectionState::Selected
    );
    assert!(received, "pushed message should be appended");
    assert!(typing, "typing indicator should be shown");
    assert_eq!(
        session.store().typing_text(&c1).as_deref(),
        Some("bob is typing…")
    );
    assert_eq!(session.store().total_unread(), 0);

    let events = backend.received_events();
    assert!(events.contains(&"conversation:join".to_string()));
    assert!(events.contains(&"messages:mark_read".to_string()));

    let stored = std::fs::read_to_string(config.store_path()).unwrap();
    assert!(stored.contains(TOKEN));
}

#[tokio::test]
async fn test_logout_clears_state_and_persisted_token() {
    // テスト項目: ログアウトで状態と保存済みトークンが破棄され、接続が閉じる
    // given (前提条件):
    let (_backend, config) = start_backend().await;
    let session = Session::open(&config).unwrap();
    session.auth().login("alice", "pw").await.unwrap();
    session.enter_messaging().await.unwrap();
    wait_until(Duration::from_secs(3), || session.connection().is_connected()).await;

    // when (操作):
    session.logout().await;

    // then (期待する結果):
    assert!(!session.auth().tokens().is_authenticated());
    assert!(!session.connection().is_connected());
    assert!(session.store().conversations().get().is_empty());
    let stored = std::fs::read_to_string(config.store_path()).unwrap();
    assert!(!stored.contains(TOKEN));
}

#[tokio::test]
async fn test_token_is_restored_on_next_start() {
    // テスト項目: 保存済みのトークンが次回起動時に復元され、そのまま会話を読み込める
    // given (前提条件):
    let (_backend, config) = start_backend().await;
    {
        let first = Session::open(&config).unwrap();
        first.auth().login("alice", "pw").await.unwrap();
    }

    // when (操作):
    let second = Session::open(&config).unwrap();
    let result = second.enter_messaging().await;

    // then (期待する結果):
    assert!(result.is_ok());
    assert_eq!(second.store().conversations().get().len(), 1);
    assert_eq!(
        second.profile().current_user().get().unwrap().display_name,
        "Alice"
    );
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    // テスト項目: 誤ったパスワードではログインできず、トークンも保存されない
    // given (前提条件):
    let (_backend, config) = start_backend().await;
    let session = Session::open(&config).unwrap();

    // when (操作):
    let result = session.auth().login("alice", "nope").await;

    // then (期待する結果):
    assert!(result.is_err());
    assert!(!session.auth().tokens().is_authenticated());
}

#[tokio::test]
async fn test_client_reconnects_after_server_drops_socket() {
    // テスト項目: サーバーがソケットを切断すると状態が false になり、再接続後に true に戻る
    // given (前提条件):
    let (backend, mut config) = start_backend().await;
    config.reconnect.initial_delay = Duration::from_millis(300);
    let session = Session::open(&config).unwrap();
    session.auth().login("alice", "pw").await.unwrap();
    session.enter_messaging().await.unwrap();
    let connected = wait_until(Duration::from_secs(3), || session.connection().status().get()).await;

    // when (操作):
    backend.drop_connections();
    let dropped = wait_until(Duration::from_secs(3), || !session.connection().status().get()).await;
    let restored = wait_until(Duration::from_secs(5), || session.connection().status().get()).await;

    // then (期待する結果):
    assert!(connected, "client should connect first");
    assert!(dropped, "status should flip to false when the socket drops");
    assert!(restored, "client should reconnect on its own");
    assert!(session.connection().is_connected());
    assert_eq!(backend.connection_count(), 2);
}
