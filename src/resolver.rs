//! Classification resolver
//!
//! Turns extractor contributions into a score vector and a confidence-gated
//! verdict, writing both back into the session.

use chrono::Utc;
use log::debug;

use crate::config::ClassifierConfig;
use crate::features::FeatureDeriver;
use crate::session::Session;
use crate::types::{Archetype, ClassificationOutcome, Verdict};

/// Resolver for one evaluation pass
pub struct ClassificationResolver;

impl ClassificationResolver {
    /// Evaluate a session in place
    ///
    /// 1. Reset the score vector to zero for every archetype.
    /// 2. Add every extractor's contribution.
    /// 3. The leader (first in registry order on ties) sets the confidence.
    /// 4. The verdict is the leader when `confidence >= threshold`, else unknown.
    ///
    /// Running this twice on unchanged state yields the same scores and verdict.
    pub fn evaluate(session: &mut Session, config: &ClassifierConfig) -> ClassificationOutcome {
        let features = FeatureDeriver::derive(session, config);

        let mut scores = session.scores().clone();
        scores.reset();
        features.contribute(&mut scores);

        let (leader, confidence) = scores.leader();
        let verdict = resolve_verdict(leader, confidence, config.confidence_threshold);

        let abstained = features.abstained();
        if !abstained.is_empty() {
            debug!(
                "session {}: extractors abstained for lack of samples: {}",
                session.id(),
                abstained.join(", ")
            );
        }

        let evaluation = session.record_evaluation(scores.clone(), confidence, verdict);
        debug!(
            "session {} evaluation #{}: verdict={} confidence={:.3}",
            session.id(),
            evaluation,
            verdict,
            confidence
        );

        ClassificationOutcome {
            session_id: session.id().to_string(),
            verdict,
            confidence,
            threshold: config.confidence_threshold,
            scores,
            features,
            evaluation,
            evaluated_at: Utc::now(),
        }
    }
}

fn resolve_verdict(leader: Archetype, confidence: f64, threshold: f64) -> Verdict {
    if confidence >= threshold {
        Verdict::Classified(leader)
    } else {
        Verdict::Unknown
    }
}
