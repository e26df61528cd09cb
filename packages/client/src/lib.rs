//! Tayori real-time messaging client library.
//!
//! This library provides the client-side synchronization core of the Tayori
//! chat application: connection management over WebSocket, inbound event
//! routing, conversation and presence state, typing indicators, and the
//! REST adapters behind them.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
pub mod error;
