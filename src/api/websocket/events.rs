//! WebSocket event types for the live telemetry feed

use serde::{Deserialize, Serialize};

use crate::types::TelemetrySample;

/// Events pushed to live subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// A freshly persisted batch of samples
    LiveUpdate { samples: Vec<TelemetrySample> },
}

/// WebSocket message wrapper with metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(flatten)]
    pub event: LiveEvent,

    /// Monotonically increasing sequence ID for gap detection
    pub sequence_id: u64,

    /// Unix timestamp (ms) when the message was produced
    pub timestamp: i64,
}

/// Client message types
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping for heartbeat
    Ping,
}

/// Welcome message sent on connection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WelcomeMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub client_id: u64,
    pub current_sequence_id: u64,
}

impl WelcomeMessage {
    pub fn new(client_id: u64, current_sequence_id: u64) -> Self {
        Self {
            msg_type: "connected".to_string(),
            client_id,
            current_sequence_id,
        }
    }
}

/// Pong response message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PongMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
}

impl Default for PongMessage {
    fn default() -> Self {
        Self {
            msg_type: "pong".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewSample;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_live_update_serialization() {
        let sample = NewSample {
            speed: 287.0,
            throttle: 99.0,
            brake: 0.0,
            gear: 7,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 1).unwrap(),
            driver_id: 1,
            race_id: 1,
        }
        .into_sample(1);

        let msg = WsMessage {
            event: LiveEvent::LiveUpdate {
                samples: vec![sample],
            },
            sequence_id: 42,
            timestamp: 1_709_391_601_000,
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "live_update");
        assert_eq!(json["sequence_id"], 42);
        assert_eq!(json["samples"][0]["speed"], 287.0);
    }

    #[test]
    fn test_client_message_parsing() {
        let json = r#"{"type":"ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_welcome_message_shape() {
        let json = serde_json::to_value(WelcomeMessage::new(7, 3)).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["client_id"], 7);
        assert_eq!(json["current_sequence_id"], 3);
    }
}
