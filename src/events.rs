// Copyright 2026 Netsieve Contributors
// SPDX-License-Identifier: Apache-2.0

//! Netsieve event bus — typed events from the capture pipeline.
//!
//! The EventBus is a `tokio::sync::broadcast` channel carrying
//! [`CaptureEvent`] values. Any consumer — the REST SSE endpoint, log
//! sinks, dashboards — can subscribe independently. When no subscribers
//! exist, events are silently dropped (zero overhead).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event netsieve emits. Serialized to JSON for SSE streaming.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CaptureEvent {
    /// The runtime started serving.
    RuntimeStarted {
        version: String,
        port: Option<u16>,
    },
    /// A capture attempt began.
    CaptureStarted {
        capture_id: String,
        target: String,
        hint: String,
        timestamp: String,
    },
    /// Navigation (including the network-idle settle) finished.
    NavigationComplete {
        capture_id: String,
        target: String,
        elapsed_ms: u64,
    },
    /// A response matched the hint and its body decoded; first match wins.
    ResponseMatched {
        capture_id: String,
        target: String,
        url: String,
        status: u16,
    },
    /// A response matched the hint but its body could not be extracted.
    /// The attempt keeps waiting for a later match.
    ExtractionSoftMiss {
        capture_id: String,
        target: String,
        url: String,
        reason: String,
    },
    /// The capture reached a terminal outcome and its session was released.
    CaptureFinished {
        capture_id: String,
        target: String,
        outcome: String,
        elapsed_ms: u64,
    },
}

/// The central event bus.
///
/// All components emit events through this bus. Consumers subscribe
/// to receive a stream of all events.
pub struct EventBus {
    sender: broadcast::Sender<CaptureEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: CaptureEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.sender.subscribe()
    }
}

/// Check if an event is related to a specific target URL.
pub fn event_matches_target(event: &CaptureEvent, target: &str) -> bool {
    match event {
        CaptureEvent::CaptureStarted { target: t, .. }
        | CaptureEvent::NavigationComplete { target: t, .. }
        | CaptureEvent::ResponseMatched { target: t, .. }
        | CaptureEvent::ExtractionSoftMiss { target: t, .. }
        | CaptureEvent::CaptureFinished { target: t, .. } => t == target,
        // System events are not target-specific — they reach all subscribers
        CaptureEvent::RuntimeStarted { .. } => true,
    }
}

/// RFC 3339 timestamp for the current time.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = CaptureEvent::CaptureStarted {
            capture_id: "c-1".to_string(),
            target: "https://example.test/page".to_string(),
            hint: "json".to_string(),
            timestamp: now_timestamp(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("CaptureStarted"));
        assert!(json.contains("example.test"));

        // Roundtrip
        let parsed: CaptureEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            CaptureEvent::CaptureStarted { hint, .. } => assert_eq!(hint, "json"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_event_bus_emit_no_subscribers() {
        let bus = EventBus::new(16);
        // Should not panic when no subscribers
        bus.emit(CaptureEvent::RuntimeStarted {
            version: "0.1.0".to_string(),
            port: Some(3001),
        });
    }

    #[test]
    fn test_event_bus_subscribe_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(CaptureEvent::CaptureFinished {
            capture_id: "c-2".to_string(),
            target: "https://example.test/page".to_string(),
            outcome: "found".to_string(),
            elapsed_ms: 420,
        });

        let event = rx.try_recv().unwrap();
        match event {
            CaptureEvent::CaptureFinished { outcome, .. } => assert_eq!(outcome, "found"),
            _ => panic!("wrong event"),
        }
    }

    #[test]
    fn test_event_matches_target() {
        let event = CaptureEvent::ResponseMatched {
            capture_id: "c-3".to_string(),
            target: "https://example.test/page".to_string(),
            url: "https://example.test/data.json".to_string(),
            status: 200,
        };
        assert!(event_matches_target(&event, "https://example.test/page"));
        assert!(!event_matches_target(&event, "https://other.test/"));

        // System events always match
        let sys = CaptureEvent::RuntimeStarted {
            version: "0.1.0".to_string(),
            port: None,
        };
        assert!(event_matches_target(&sys, "anything"));
    }
}
