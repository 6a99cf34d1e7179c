//! Reaction dispatch
//!
//! Maps a resolved archetype to the handlers registered for it. The engine
//! calls [`ReactionDispatcher::dispatch`] once after every evaluation pass;
//! what a handler does with the verdict (badges, feature toggles,
//! notifications) is entirely up to the hosting layer.

use log::warn;
use std::collections::BTreeMap;
use std::fmt;

use crate::session::Session;
use crate::types::{Archetype, ClassificationOutcome};

/// Downstream effect for a concrete verdict
///
/// Handlers run while the session is locked; they must not call back into
/// the classifier for the same session.
pub trait ReactionHandler: Send + Sync {
    fn react(&self, archetype: Archetype, outcome: &ClassificationOutcome, session: &Session);
}

impl<F> ReactionHandler for F
where
    F: Fn(Archetype, &ClassificationOutcome, &Session) + Send + Sync,
{
    fn react(&self, archetype: Archetype, outcome: &ClassificationOutcome, session: &Session) {
        self(archetype, outcome, session)
    }
}

/// Registered mapping from archetype to reaction handlers
#[derive(Default)]
pub struct ReactionDispatcher {
    handlers: BTreeMap<Archetype, Vec<Box<dyn ReactionHandler>>>,
}

impl fmt::Debug for ReactionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(a, h)| (a.as_str(), h.len()))
            .collect();
        f.debug_struct("ReactionDispatcher")
            .field("handlers", &counts)
            .finish()
    }
}

impl ReactionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an archetype; handlers run in registration order
    pub fn register(&mut self, archetype: Archetype, handler: impl ReactionHandler + 'static) {
        self.handlers
            .entry(archetype)
            .or_default()
            .push(Box::new(handler));
    }

    /// Number of handlers registered for an archetype
    pub fn handler_count(&self, archetype: Archetype) -> usize {
        self.handlers.get(&archetype).map_or(0, Vec::len)
    }

    /// Hand a concrete verdict to its handlers
    ///
    /// No-op for an unknown verdict or a confidence below the outcome's
    /// threshold. Returns the archetype that was dispatched, even when no
    /// handler is registered for it.
    pub fn dispatch(&self, outcome: &ClassificationOutcome, session: &Session) -> Option<Archetype> {
        let archetype = outcome.verdict.archetype()?;
        if outcome.confidence < outcome.threshold {
            return None;
        }

        match self.handlers.get(&archetype) {
            Some(handlers) => {
                for handler in handlers {
                    handler.react(archetype, outcome, session);
                }
            }
            None => warn!(
                "session {}: no reaction registered for {}",
                outcome.session_id, archetype
            ),
        }
        Some(archetype)
    }
}
