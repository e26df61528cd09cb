//! Infrastructure 層
//!
//! Domain 層が定義するインターフェース（`RestApi`, `Connector`）の具体的な実装と、
//! ローカルストレージを提供します。

pub mod dto;
pub mod http;
pub mod storage;
pub mod websocket;

pub use http::HttpRestApi;
pub use storage::LocalStore;
pub use websocket::WebSocketConnector;
