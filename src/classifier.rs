//! Classifier orchestration
//!
//! This module provides the public API for visitor classification. It ties
//! the session store, the resolver and the reaction dispatcher together:
//! telemetry is appended, the session is re-evaluated and the resulting
//! verdict is dispatched, all under the session's own lock.

use log::{info, warn};

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::reaction::{ReactionDispatcher, ReactionHandler};
use crate::resolver::ClassificationResolver;
use crate::schema::VisitorEvent;
use crate::session::Session;
use crate::store::SessionStore;
use crate::types::{Archetype, ClassificationOutcome};

/// Classify a batch of events in one shot (stateless).
///
/// Events are grouped by session in first-seen order; each session is
/// evaluated once after all of its events are applied.
///
/// # Example
/// ```ignore
/// let report = classify_events(&events);
/// ```
pub fn classify_events(events: &[VisitorEvent]) -> BatchReport {
    ArchetypeClassifier::new().classify_all(events)
}

/// A session whose events were rejected as a whole
#[derive(Debug)]
pub struct SessionRejection {
    pub session_id: String,
    pub error: ClassifierError,
}

/// Result of classifying a mixed-session batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One outcome per accepted session, in first-seen order
    pub outcomes: Vec<ClassificationOutcome>,
    /// Sessions whose batch was rejected
    pub rejections: Vec<SessionRejection>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }
}

/// Stateful classifier holding every live session.
///
/// All methods take `&self`: writes to one session are serialized by the
/// store while different sessions may be driven from different threads.
#[derive(Debug, Default)]
pub struct ArchetypeClassifier {
    store: SessionStore,
    config: ClassifierConfig,
    dispatcher: ReactionDispatcher,
}

impl ArchetypeClassifier {
    /// Create a classifier with the default reference model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with a validated configuration
    pub fn with_config(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Replace the reaction dispatcher
    pub fn with_dispatcher(mut self, dispatcher: ReactionDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Register a reaction for an archetype
    pub fn register_reaction(&mut self, archetype: Archetype, handler: impl ReactionHandler + 'static) {
        self.dispatcher.register(archetype, handler);
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Create a new session; fails if the id is already live
    pub fn create_session(&self, id: &str) -> Result<Session, ClassifierError> {
        self.store.create_session(id)
    }

    /// Consistent snapshot of a session
    pub fn get_session(&self, id: &str) -> Result<Session, ClassifierError> {
        self.store.get_session(id)
    }

    /// Drop a session (expiry is decided by the host)
    pub fn remove_session(&self, id: &str) -> Result<Session, ClassifierError> {
        self.store.remove_session(id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.store.session_ids()
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Drop every session
    pub fn clear_sessions(&self) {
        self.store.clear();
    }

    /// Save all sessions to JSON for persistence
    pub fn save_sessions(&self) -> Result<String, ClassifierError> {
        self.store.to_json()
    }

    /// Replace all sessions with a JSON snapshot
    ///
    /// Restored sessions are re-scored under this classifier's configuration.
    /// Reactions are not dispatched for the restore itself.
    pub fn load_sessions(&mut self, json: &str) -> Result<(), ClassifierError> {
        let store = SessionStore::from_json(json)?;
        for id in store.session_ids() {
            let handle = store.handle(&id)?;
            let mut session = handle.lock();
            ClassificationResolver::evaluate(&mut session, &self.config);
        }
        self.store = store;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------

    /// Record a page visit and re-evaluate
    pub fn record_page_visit(&self, id: &str, path: &str, arrived_at_ms: f64) -> Result<ClassificationOutcome, ClassifierError> {
        self.append_and_evaluate(id, |s| s.push_page_visit(path, arrived_at_ms))
    }

    /// Stamp departure on the latest visit; returns whether a visit was stamped
    pub fn record_departure(&self, id: &str, departed_at_ms: f64) -> Result<bool, ClassifierError> {
        self.store.record_departure(id, departed_at_ms)
    }

    /// Record a pointer sample and re-evaluate
    pub fn record_pointer_sample(&self, id: &str, x: f64, y: f64, timestamp_ms: f64) -> Result<ClassificationOutcome, ClassifierError> {
        self.append_and_evaluate(id, |s| s.push_pointer_sample(x, y, timestamp_ms))
    }

    /// Record a scroll sample and re-evaluate
    pub fn record_scroll_sample(
        &self,
        id: &str,
        offset_y: f64,
        viewport_height: f64,
        document_height: f64,
        timestamp_ms: f64,
    ) -> Result<ClassificationOutcome, ClassifierError> {
        self.append_and_evaluate(id, |s| {
            s.push_scroll_sample(offset_y, viewport_height, document_height, timestamp_ms)
        })
    }

    /// Record an outbound call and re-evaluate
    pub fn record_outbound_call(
        &self,
        id: &str,
        target: &str,
        method: &str,
        timestamp_ms: f64,
    ) -> Result<ClassificationOutcome, ClassifierError> {
        self.append_and_evaluate(id, |s| s.push_outbound_call(target, method, timestamp_ms))
    }

    /// Record a free-form interaction (not scored, so no re-evaluation)
    pub fn record_interaction(
        &self,
        id: &str,
        kind: &str,
        payload: serde_json::Value,
        timestamp_ms: f64,
    ) -> Result<(), ClassifierError> {
        self.store.append_interaction(id, kind, payload, timestamp_ms)
    }

    /// Re-evaluate a session without new telemetry
    pub fn evaluate(&self, id: &str) -> Result<ClassificationOutcome, ClassifierError> {
        let handle = self.store.handle(id)?;
        let mut session = handle.lock();
        Ok(self.evaluate_locked(&mut session))
    }

    /// Apply one inbound event, creating its session on first sight
    ///
    /// Returns the new outcome when the event feeds an extractor, `None` for
    /// departures and free-form interactions.
    pub fn ingest(&self, event: &VisitorEvent) -> Result<Option<ClassificationOutcome>, ClassifierError> {
        if let Err(e) = event.validate() {
            warn!("rejected {} event for session {}: {}", event.kind(), event.session_id(), e);
            return Err(e);
        }

        let handle = self.store.get_or_create(event.session_id());
        let mut session = handle.lock();
        if let Err(e) = apply_event(&mut session, event) {
            warn!("rejected {} event for session {}: {}", event.kind(), event.session_id(), e);
            return Err(e);
        }

        if event.triggers_evaluation() {
            Ok(Some(self.evaluate_locked(&mut session)))
        } else {
            Ok(None)
        }
    }

    /// Parse and apply one JSON-encoded event
    pub fn ingest_json(&self, json: &str) -> Result<Option<ClassificationOutcome>, ClassifierError> {
        let event = crate::schema::parse_event(json)?;
        self.ingest(&event)
    }

    /// Apply a batch of events to one session and evaluate exactly once
    ///
    /// The batch is all-or-nothing: if any event is rejected an existing
    /// session is left as it was and an unknown id is never created.
    pub fn ingest_batch(&self, id: &str, events: &[VisitorEvent]) -> Result<ClassificationOutcome, ClassifierError> {
        for event in events {
            if event.session_id() != id {
                return Err(ClassifierError::InvalidEvent(format!(
                    "batch for session {} contains event for session {}",
                    id,
                    event.session_id()
                )));
            }
            event.validate()?;
        }

        loop {
            if let Ok(handle) = self.store.handle(id) {
                let mut session = handle.lock();
                let staged = stage_batch(session.clone(), events)?;
                *session = staged;
                return Ok(self.evaluate_locked(&mut session));
            }

            // A new session only enters the store once the whole batch applied
            let staged = stage_batch(Session::new(id), events)?;
            match self.store.insert_session(staged) {
                Ok(handle) => {
                    let mut session = handle.lock();
                    return Ok(self.evaluate_locked(&mut session));
                }
                // Another caller created the id meanwhile; apply on top of theirs
                Err(ClassifierError::DuplicateSession(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Classify a mixed-session batch, one `ingest_batch` per session
    ///
    /// Sessions are processed in first-seen order and each yields one
    /// outcome for its final state. A rejected session is reported in
    /// [`BatchReport::rejections`] and leaves every other session untouched.
    pub fn classify_all(&self, events: &[VisitorEvent]) -> BatchReport {
        let mut order: Vec<&str> = Vec::new();
        for event in events {
            if !order.contains(&event.session_id()) {
                order.push(event.session_id());
            }
        }

        let mut report = BatchReport::default();
        for id in order {
            let batch: Vec<VisitorEvent> = events
                .iter()
                .filter(|e| e.session_id() == id)
                .cloned()
                .collect();
            match self.ingest_batch(id, &batch) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(error) => {
                    warn!("session {} skipped: {}", id, error);
                    report.rejections.push(SessionRejection {
                        session_id: id.to_string(),
                        error,
                    });
                }
            }
        }
        report
    }

    fn append_and_evaluate(
        &self,
        id: &str,
        append: impl FnOnce(&mut Session) -> Result<(), ClassifierError>,
    ) -> Result<ClassificationOutcome, ClassifierError> {
        let handle = self.store.handle(id)?;
        let mut session = handle.lock();
        append(&mut session)?;
        Ok(self.evaluate_locked(&mut session))
    }

    /// Evaluate and dispatch; caller holds the session lock
    fn evaluate_locked(&self, session: &mut Session) -> ClassificationOutcome {
        let previous = session.verdict();
        let outcome = ClassificationResolver::evaluate(session, &self.config);

        if outcome.verdict != previous {
            info!(
                "session {} verdict {} -> {} (confidence {:.3})",
                outcome.session_id, previous, outcome.verdict, outcome.confidence
            );
        }

        self.dispatcher.dispatch(&outcome, session);
        outcome
    }
}

fn apply_event(session: &mut Session, event: &VisitorEvent) -> Result<(), ClassifierError> {
    match event {
        VisitorEvent::PageVisit { path, timestamp_ms, .. } => session.push_page_visit(path, *timestamp_ms),
        VisitorEvent::PageDeparture { timestamp_ms, .. } => session.mark_departure(*timestamp_ms).map(|_| ()),
        VisitorEvent::PointerSample { x, y, timestamp_ms, .. } => {
            session.push_pointer_sample(*x, *y, *timestamp_ms)
        }
        VisitorEvent::ScrollSample {
            offset_y,
            viewport_height,
            document_height,
            timestamp_ms,
            ..
        } => session.push_scroll_sample(*offset_y, *viewport_height, *document_height, *timestamp_ms),
        VisitorEvent::OutboundCall {
            target,
            method,
            timestamp_ms,
            ..
        } => session.push_outbound_call(target, method, *timestamp_ms),
        VisitorEvent::Interaction {
            kind,
            payload,
            timestamp_ms,
            ..
        } => session.push_interaction(kind, payload.clone(), *timestamp_ms),
    }
}

fn stage_batch(mut staged: Session, events: &[VisitorEvent]) -> Result<Session, ClassifierError> {
    for event in events {
        if let Err(e) = apply_event(&mut staged, event) {
            warn!("rejected batch for session {}: {}", staged.id(), e);
            return Err(e);
        }
    }
    Ok(staged)
}
