//! Visitor Archetypes - Deterministic behavioral classifier for anonymous sessions
//!
//! Classifies a visitor's interaction session into a behavioral archetype
//! (organic human use, programmatic access, mixed use, systematic scanning)
//! through a deterministic pipeline: event validation → session state →
//! feature extraction → score resolution → reaction dispatch.
//!
//! ## Modules
//!
//! - **Session State**: Per-visitor telemetry with bounded pointer and scroll windows
//! - **Feature Extractors**: Navigation timing, pointer and scroll naturalness,
//!   path entropy and outbound-call ratio
//! - **Resolver**: Confidence-gated verdicts over a fixed archetype order

pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod profile;
pub mod reaction;
pub mod resolver;
pub mod schema;
pub mod session;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::{classify_events, ArchetypeClassifier, BatchReport, SessionRejection};
pub use config::{ClassifierConfig, MinimumSamples, DEFAULT_CONFIDENCE_THRESHOLD};
pub use error::ClassifierError;
pub use features::{DerivedFeatures, FeatureDeriver};
pub use profile::{ArchetypeProfile, ProfileRegistry};
pub use reaction::{ReactionDispatcher, ReactionHandler};
pub use resolver::ClassificationResolver;
pub use session::{Session, POINTER_SAMPLE_CAP, SCROLL_SAMPLE_CAP};
pub use store::SessionStore;
pub use types::{Archetype, ClassificationOutcome, ScoreVector, Verdict};

// Schema exports
pub use schema::{parse_array, parse_event, parse_ndjson, VisitorEvent, SCHEMA_VERSION};

/// Crate version embedded in CLI and FFI output
pub const CLASSIFIER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and FFI
pub const PRODUCER_NAME: &str = "visitor-archetypes";
