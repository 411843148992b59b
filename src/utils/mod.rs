//! Utility functions and helpers
//!
//! This module contains the injectable clock, instant formatting helpers and
//! the shutdown signal wrapper.

pub mod shutdown;
pub mod time;

pub use shutdown::shutdown_requested;
pub use time::{format_instant, parse_instant, Clock, ManualClock, SystemClock};
