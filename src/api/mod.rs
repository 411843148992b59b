//! API module for HTTP and WebSocket endpoints
//!
//! The live feed and the read API run on separate listeners so a burst of
//! websocket traffic never competes with point reads.

pub mod http;
pub mod rest;
pub mod websocket;

pub use http::{api_router, live_router};
pub use rest::ReadState;
pub use websocket::LiveBroadcaster;
