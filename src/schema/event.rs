//! visitor.event.v1 schema definition
//!
//! Inbound telemetry produced by an external capture layer. Every event names
//! the session it belongs to and carries a millisecond timestamp. Events are
//! validated here before they can reach the session store.

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Current schema version
pub const SCHEMA_VERSION: &str = "visitor.event.v1";

fn default_method() -> String {
    "GET".to_string()
}

/// A single inbound telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisitorEvent {
    /// Arrival on a page
    PageVisit {
        session_id: String,
        path: String,
        timestamp_ms: f64,
    },
    /// Departure from the current page
    PageDeparture {
        session_id: String,
        timestamp_ms: f64,
    },
    /// Pointer position sample
    PointerSample {
        session_id: String,
        x: f64,
        y: f64,
        timestamp_ms: f64,
    },
    /// Scroll position sample
    ScrollSample {
        session_id: String,
        offset_y: f64,
        viewport_height: f64,
        document_height: f64,
        timestamp_ms: f64,
    },
    /// Outbound call issued by the page
    OutboundCall {
        session_id: String,
        target: String,
        #[serde(default = "default_method")]
        method: String,
        timestamp_ms: f64,
    },
    /// Free-form interaction
    Interaction {
        session_id: String,
        kind: String,
        #[serde(default)]
        payload: serde_json::Value,
        timestamp_ms: f64,
    },
}

impl VisitorEvent {
    pub fn page_visit(session_id: &str, path: &str, timestamp_ms: f64) -> Self {
        VisitorEvent::PageVisit {
            session_id: session_id.to_string(),
            path: path.to_string(),
            timestamp_ms,
        }
    }

    pub fn page_departure(session_id: &str, timestamp_ms: f64) -> Self {
        VisitorEvent::PageDeparture {
            session_id: session_id.to_string(),
            timestamp_ms,
        }
    }

    pub fn pointer_sample(session_id: &str, x: f64, y: f64, timestamp_ms: f64) -> Self {
        VisitorEvent::PointerSample {
            session_id: session_id.to_string(),
            x,
            y,
            timestamp_ms,
        }
    }

    pub fn scroll_sample(
        session_id: &str,
        offset_y: f64,
        viewport_height: f64,
        document_height: f64,
        timestamp_ms: f64,
    ) -> Self {
        VisitorEvent::ScrollSample {
            session_id: session_id.to_string(),
            offset_y,
            viewport_height,
            document_height,
            timestamp_ms,
        }
    }

    pub fn outbound_call(session_id: &str, target: &str, method: &str, timestamp_ms: f64) -> Self {
        VisitorEvent::OutboundCall {
            session_id: session_id.to_string(),
            target: target.to_string(),
            method: method.to_string(),
            timestamp_ms,
        }
    }

    pub fn interaction(
        session_id: &str,
        kind: &str,
        payload: serde_json::Value,
        timestamp_ms: f64,
    ) -> Self {
        VisitorEvent::Interaction {
            session_id: session_id.to_string(),
            kind: kind.to_string(),
            payload,
            timestamp_ms,
        }
    }

    /// Session this event belongs to
    pub fn session_id(&self) -> &str {
        match self {
            VisitorEvent::PageVisit { session_id, .. }
            | VisitorEvent::PageDeparture { session_id, .. }
            | VisitorEvent::PointerSample { session_id, .. }
            | VisitorEvent::ScrollSample { session_id, .. }
            | VisitorEvent::OutboundCall { session_id, .. }
            | VisitorEvent::Interaction { session_id, .. } => session_id,
        }
    }

    pub fn timestamp_ms(&self) -> f64 {
        match self {
            VisitorEvent::PageVisit { timestamp_ms, .. }
            | VisitorEvent::PageDeparture { timestamp_ms, .. }
            | VisitorEvent::PointerSample { timestamp_ms, .. }
            | VisitorEvent::ScrollSample { timestamp_ms, .. }
            | VisitorEvent::OutboundCall { timestamp_ms, .. }
            | VisitorEvent::Interaction { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// Schema tag of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            VisitorEvent::PageVisit { .. } => "page_visit",
            VisitorEvent::PageDeparture { .. } => "page_departure",
            VisitorEvent::PointerSample { .. } => "pointer_sample",
            VisitorEvent::ScrollSample { .. } => "scroll_sample",
            VisitorEvent::OutboundCall { .. } => "outbound_call",
            VisitorEvent::Interaction { .. } => "interaction",
        }
    }

    /// Whether this event changes state read by a feature extractor
    ///
    /// Departures and free-form interactions are recorded but never scored.
    pub fn triggers_evaluation(&self) -> bool {
        !matches!(
            self,
            VisitorEvent::PageDeparture { .. } | VisitorEvent::Interaction { .. }
        )
    }

    /// Validate the event against the schema
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.session_id().trim().is_empty() {
            return Err(ClassifierError::InvalidEvent(format!(
                "{}: session_id must not be empty",
                self.kind()
            )));
        }
        ensure_timestamp(self.timestamp_ms())?;

        match self {
            VisitorEvent::PageVisit { path, .. } => ensure_non_empty("path", path),
            VisitorEvent::PointerSample { x, y, .. } => {
                ensure_finite("x", *x)?;
                ensure_finite("y", *y)
            }
            VisitorEvent::ScrollSample {
                offset_y,
                viewport_height,
                document_height,
                ..
            } => {
                ensure_finite("offset_y", *offset_y)?;
                ensure_dimension("viewport_height", *viewport_height)?;
                ensure_dimension("document_height", *document_height)
            }
            VisitorEvent::OutboundCall { target, method, .. } => {
                ensure_non_empty("target", target)?;
                ensure_non_empty("method", method)
            }
            VisitorEvent::Interaction { kind, .. } => ensure_non_empty("kind", kind),
            VisitorEvent::PageDeparture { .. } => Ok(()),
        }
    }
}

/// Parse a single event from JSON
pub fn parse_event(json: &str) -> Result<VisitorEvent, ClassifierError> {
    serde_json::from_str(json)
        .map_err(|e| ClassifierError::ParseError(format!("Failed to parse visitor event: {}", e)))
}

/// Parse a JSON array of events
pub fn parse_array(json: &str) -> Result<Vec<VisitorEvent>, ClassifierError> {
    let events: Vec<VisitorEvent> = serde_json::from_str(json)?;
    Ok(events)
}

/// Parse NDJSON (one event per line, blank lines skipped)
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<VisitorEvent>, ClassifierError> {
    let mut events = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<VisitorEvent>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => {
                return Err(ClassifierError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(events)
}

/// A rejected event and its position in the input
#[derive(Debug)]
pub struct EventRejection {
    pub index: usize,
    pub session_id: String,
    pub error: ClassifierError,
}

/// Validate every event, returning only the rejections
pub fn validate_events(events: &[VisitorEvent]) -> Vec<EventRejection> {
    events
        .iter()
        .enumerate()
        .filter_map(|(index, event)| {
            event.validate().err().map(|error| EventRejection {
                index,
                session_id: event.session_id().to_string(),
                error,
            })
        })
        .collect()
}

pub(crate) fn ensure_timestamp(timestamp_ms: f64) -> Result<(), ClassifierError> {
    if !timestamp_ms.is_finite() || timestamp_ms < 0.0 {
        return Err(ClassifierError::InvalidEvent(format!(
            "timestamp_ms must be a non-negative finite number, got {}",
            timestamp_ms
        )));
    }
    Ok(())
}

pub(crate) fn ensure_finite(field: &str, value: f64) -> Result<(), ClassifierError> {
    if !value.is_finite() {
        return Err(ClassifierError::InvalidEvent(format!(
            "{} must be finite, got {}",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn ensure_dimension(field: &str, value: f64) -> Result<(), ClassifierError> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(ClassifierError::InvalidEvent(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn ensure_non_empty(field: &str, value: &str) -> Result<(), ClassifierError> {
    if value.trim().is_empty() {
        return Err(ClassifierError::InvalidEvent(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_page_visit() {
        let json = r#"{"type": "page_visit", "session_id": "s1", "path": "/pricing", "timestamp_ms": 1200.0}"#;
        let event = parse_event(json).unwrap();
        assert_eq!(event, VisitorEvent::page_visit("s1", "/pricing", 1200.0));
        assert_eq!(event.kind(), "page_visit");
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_outbound_call_defaults_method() {
        let json = r#"{"type": "outbound_call", "session_id": "s1", "target": "/api/items", "timestamp_ms": 5.0}"#;
        let event = parse_event(json).unwrap();
        match event {
            VisitorEvent::OutboundCall { method, .. } => assert_eq!(method, "GET"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_serialized_tag() {
        let event = VisitorEvent::scroll_sample("s1", 300.0, 800.0, 4000.0, 10.0);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scroll_sample");
        assert_eq!(json["offset_y"], 300.0);
    }

    #[test]
    fn test_unknown_type_is_parse_error() {
        let json = r#"{"type": "keypress", "session_id": "s1", "timestamp_ms": 5.0}"#;
        assert!(matches!(parse_event(json), Err(ClassifierError::ParseError(_))));
    }

    #[test]
    fn test_rejects_negative_timestamp() {
        let event = VisitorEvent::page_visit("s1", "/", -1.0);
        assert!(matches!(event.validate(), Err(ClassifierError::InvalidEvent(_))));
    }

    #[test]
    fn test_rejects_nan_coordinates() {
        let event = VisitorEvent::pointer_sample("s1", f64::NAN, 10.0, 5.0);
        assert!(event.validate().is_err());

        let event = VisitorEvent::pointer_sample("s1", 1.0, f64::INFINITY, 5.0);
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_fields() {
        assert!(VisitorEvent::page_visit("", "/", 0.0).validate().is_err());
        assert!(VisitorEvent::page_visit("s1", "  ", 0.0).validate().is_err());
        assert!(VisitorEvent::outbound_call("s1", "", "GET", 0.0).validate().is_err());
        assert!(VisitorEvent::scroll_sample("s1", 0.0, -5.0, 100.0, 0.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_evaluation_triggers() {
        assert!(VisitorEvent::page_visit("s1", "/", 0.0).triggers_evaluation());
        assert!(VisitorEvent::outbound_call("s1", "/api", "POST", 0.0).triggers_evaluation());
        assert!(!VisitorEvent::page_departure("s1", 0.0).triggers_evaluation());
        assert!(!VisitorEvent::interaction("s1", "focus", serde_json::Value::Null, 0.0)
            .triggers_evaluation());
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let ndjson = r#"{"type": "page_visit", "session_id": "a", "path": "/", "timestamp_ms": 0}

{"type": "page_departure", "session_id": "a", "timestamp_ms": 900}
"#;
        let events = parse_ndjson(ndjson).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], VisitorEvent::page_departure("a", 900.0));
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"type\": \"page_visit\", \"session_id\": \"a\", \"path\": \"/\", \"timestamp_ms\": 0}\nnot json\n";
        let err = parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array_and_validate_events() {
        let json = r#"[
            {"type": "pointer_sample", "session_id": "a", "x": 1, "y": 2, "timestamp_ms": 10},
            {"type": "page_visit", "session_id": "b", "path": "", "timestamp_ms": 10}
        ]"#;
        let events = parse_array(json).unwrap();
        assert_eq!(events.len(), 2);

        let rejections = validate_events(&events);
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].index, 1);
        assert_eq!(rejections[0].session_id, "b");
    }
}
