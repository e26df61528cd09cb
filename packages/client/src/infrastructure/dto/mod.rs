//! Data Transfer Objects (DTOs) for the messaging client.
//!
//! DTOs are organized by protocol:
//! - `websocket`: event stream envelope and frame codec
//! - `http`: REST API response envelope

pub mod http;
pub mod websocket;
