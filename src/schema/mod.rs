//! Unified visitor.event.v1 schema
//!
//! This module defines the inbound telemetry schema consumed by the session
//! store: page visits and departures, pointer and scroll samples, outbound
//! calls and free-form interactions.

mod event;

pub(crate) use event::{ensure_dimension, ensure_finite, ensure_non_empty, ensure_timestamp};
pub use event::{
    parse_array, parse_event, parse_ndjson, validate_events, EventRejection, VisitorEvent, SCHEMA_VERSION,
};
