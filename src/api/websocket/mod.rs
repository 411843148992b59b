//! WebSocket module for the live telemetry feed
//!
//! Provides the `/ws` endpoint that pushes every persisted batch to all
//! connected subscribers.
//!
//! ## Features
//! - `connected` welcome carrying the current sequence ID
//! - `live_update` messages with the full batch
//! - Sequence ID tracking for gap detection
//! - `lagged` notice for subscribers that fall behind

pub mod broadcaster;
pub mod events;
pub mod handler;

pub use broadcaster::LiveBroadcaster;
pub use events::{LiveEvent, WsMessage};
