//! WebSocket を使った Connector 実装
//!
//! ## 責務
//!
//! - トークン付きのハンドシェイク（`Authorization: Bearer`）
//! - 受信フレームのデコードと [`TransportEvent`] への変換
//! - 送信キューからのフレーム送信
//! - 切断時の再接続（[`ReconnectPolicy`] に従う指数バックオフ）
//!
//! 接続状態は `TransportHandle` と共有する `AtomicBool` で公開します。
//! 未接続の間に積まれた送信イベントは再接続前に捨てます（キューイングしない）。

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{self, HeaderValue, StatusCode, header::AUTHORIZATION},
        protocol::Message as WsMessage,
    },
};

use crate::{
    config::ReconnectPolicy,
    domain::{
        Connector, OutboundEvent, TransportEvent, TransportEventKind, TransportHandle,
    },
    infrastructure::dto::websocket::{decode_inbound, encode_outbound},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket を使った Connector 実装
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    policy: ReconnectPolicy,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
        }
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &self,
        transport_id: u64,
        token: &str,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> TransportHandle {
        let connected = Arc::new(AtomicBool::new(false));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let worker = TransportWorker {
            transport_id,
            url: self.url.clone(),
            token: token.to_string(),
            policy: self.policy,
            connected: Arc::clone(&connected),
            events,
        };
        let task = tokio::spawn(worker.run(outbound_rx));

        TransportHandle::new(transport_id, connected, outbound_tx, Some(task))
    }
}

/// Build the upgrade request with the session token attached.
pub fn build_request(url: &str, token: &str) -> Result<Request, WsError> {
    let mut request = url.into_client_request()?;
    let bearer =
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(http::Error::from)?;
    request.headers_mut().insert(AUTHORIZATION, bearer);
    Ok(request)
}

/// The backend refused the token; retrying with the same token is pointless.
fn is_unauthorized(error: &WsError) -> bool {
    matches!(error, WsError::Http(response) if response.status() == StatusCode::UNAUTHORIZED)
}

struct TransportWorker {
    transport_id: u64,
    url: String,
    token: String,
    policy: ReconnectPolicy,
    connected: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportWorker {
    /// Returns false once nobody listens anymore.
    fn notify(&self, kind: TransportEventKind) -> bool {
        self.events
            .send(TransportEvent {
                transport_id: self.transport_id,
                kind,
            })
            .is_ok()
    }

    async fn run(self, mut outbound: mpsc::UnboundedReceiver<OutboundEvent>) {
        // failed attempts since the last successful connection
        let mut attempt: u32 = 0;
        let mut ever_connected = false;

        loop {
            if attempt > 0 {
                let delay = self.policy.delay_for(attempt);
                tracing::info!(
                    "Reconnecting in {:?}... (attempt {}/{})",
                    delay,
                    attempt,
                    self.policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }

            tracing::info!("Attempting to connect to {}", self.url);
            let connection = match build_request(&self.url, &self.token) {
                Ok(request) => connect_async(request).await,
                Err(e) => Err(e),
            };

            match connection {
                Ok((stream, _response)) => {
                    self.connected.store(true, Ordering::SeqCst);
                    let kind = if ever_connected || attempt > 0 {
                        tracing::info!("Reconnected after {} attempt(s)", attempt);
                        TransportEventKind::Reconnected { attempt }
                    } else {
                        tracing::info!("Connected to {}", self.url);
                        TransportEventKind::Connected
                    };
                    ever_connected = true;
                    attempt = 0;
                    if !self.notify(kind) {
                        return;
                    }

                    let reason = self.pump(stream, &mut outbound).await;
                    self.connected.store(false, Ordering::SeqCst);
                    // emits that raced the disconnect are dropped, not replayed
                    while outbound.try_recv().is_ok() {}

                    tracing::warn!("Connection lost: {}", reason);
                    if !self.notify(TransportEventKind::Disconnected { reason }) {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("Connection error: {}", e);
                    let unauthorized = is_unauthorized(&e);
                    if !self.notify(TransportEventKind::ConnectError {
                        message: e.to_string(),
                    }) {
                        return;
                    }
                    if unauthorized {
                        tracing::error!("Server rejected the session token. Giving up.");
                        return;
                    }
                }
            }

            if !self.policy.should_retry(attempt) {
                tracing::error!(
                    "Failed to reconnect after {} attempts. Giving up.",
                    self.policy.max_attempts
                );
                self.notify(TransportEventKind::ReconnectFailed);
                return;
            }
            attempt += 1;
        }
    }

    /// Move frames in both directions until the connection ends.
    ///
    /// Returns the reason the connection ended.
    async fn pump(
        &self,
        stream: WsStream,
        outbound: &mut mpsc::UnboundedReceiver<OutboundEvent>,
    ) -> String {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => match decode_inbound(&text) {
                        Ok(event) => {
                            tracing::debug!("Received '{}'", event.name());
                            if !self.notify(TransportEventKind::Inbound(event)) {
                                return "client dropped".to_string();
                            }
                        }
                        Err(e) => tracing::warn!("Dropping inbound frame: {}", e),
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        return frame
                            .map(|f| f.reason.to_string())
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return e.to_string(),
                    None => return "stream ended".to_string(),
                },
                event = outbound.recv() => match event {
                    Some(event) => {
                        let json = match encode_outbound(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!("Failed to serialize '{}': {}", event.name(), e);
                                continue;
                            }
                        };
                        if let Err(e) = write.send(WsMessage::Text(json.into())).await {
                            return e.to_string();
                        }
                        tracing::debug!("Sent '{}'", event.name());
                    }
                    None => {
                        let _ = write.close().await;
                        return "client closed".to_string();
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_attaches_bearer_token() {
        // テスト項目: ハンドシェイクのリクエストに Bearer トークンが付与される
        // given (前提条件):
        let url = "ws://127.0.0.1:3000/ws";

        // when (操作):
        let request = build_request(url, "secret").unwrap();

        // then (期待する結果):
        assert_eq!(request.uri(), "ws://127.0.0.1:3000/ws");
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn test_build_request_rejects_invalid_url() {
        // テスト項目: 不正な URL はエラーになる
        // given (前提条件):
        let url = "not a url";

        // when (操作):
        let result = build_request(url, "secret");

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_reports_connect_error_and_gives_up() {
        // テスト項目: 接続できない場合は ConnectError を通知し、上限到達で ReconnectFailed を通知する
        // given (前提条件):
        let policy = ReconnectPolicy {
            max_attempts: 1,
            initial_delay: std::time::Duration::from_millis(10),
            max_delay: std::time::Duration::from_millis(10),
        };
        // 誰も待ち受けていないポート
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let connector = WebSocketConnector::new(format!("ws://127.0.0.1:{}/ws", port), policy);
        let (tx, mut rx) = mpsc::unbounded_channel();

        // when (操作):
        let handle = connector.open(3, "token", tx);
        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.transport_id, 3);
            kinds.push(event.kind);
        }

        // then (期待する結果):
        assert!(!handle.is_connected());
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[0], TransportEventKind::ConnectError { .. }));
        assert!(matches!(kinds[1], TransportEventKind::ConnectError { .. }));
        assert_eq!(kinds[2], TransportEventKind::ReconnectFailed);
    }
}
