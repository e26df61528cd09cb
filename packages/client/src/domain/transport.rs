//! Connector trait 定義
//!
//! イベントストリーム（WebSocket）を開くためのインターフェース。
//! 接続の状態変化と受信イベントは [`TransportEvent`] として 1 本のチャネルに流れる。

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{sync::mpsc, task::JoinHandle};

use super::event::{InboundEvent, OutboundEvent};

/// トランスポートから届くイベント
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    /// どの接続から届いたか（置き換え済みの接続からのイベントを無視するため）
    pub transport_id: u64,
    pub kind: TransportEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    Connected,
    Reconnected { attempt: u32 },
    Disconnected { reason: String },
    ConnectError { message: String },
    /// 再接続の試行回数を使い切った
    ReconnectFailed,
    Inbound(InboundEvent),
}

/// 開いた接続へのハンドル
///
/// drop すると接続タスクは中断される。
#[derive(Debug)]
pub struct TransportHandle {
    id: u64,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    pub fn new(
        id: u64,
        connected: Arc<AtomicBool>,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            id,
            connected,
            outbound,
            task,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// 接続中、またはハンドシェイク・再接続を試みている最中
    ///
    /// 接続タスクを持たないハンドルは接続中のときだけ有効とみなす。
    pub fn is_active(&self) -> bool {
        self.is_connected() || self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// 接続中なら送信キューに積む。未接続なら何もせず false を返す。
    pub fn emit(&self, event: OutboundEvent) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.outbound.send(event).is_ok()
    }

    pub fn close(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// イベントストリームへの接続を開く
pub trait Connector: Send + Sync {
    /// 接続を開始する。接続処理はバックグラウンドで進み、結果は `events` に届く。
    fn open(
        &self,
        transport_id: u64,
        token: &str,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> TransportHandle;
}
