//! Per-visitor session state
//!
//! A session aggregates all telemetry recorded for one visitor together with
//! the score vector and verdict of the most recent evaluation. Page visits,
//! outbound calls and interactions grow without bound; pointer and scroll
//! samples are rolling windows that evict the oldest sample first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::ClassifierError;
use crate::schema::{ensure_dimension, ensure_finite, ensure_non_empty, ensure_timestamp};
use crate::types::{
    Interaction, OutboundCall, PageVisit, PointerSample, ScoreVector, ScrollSample, Verdict,
};

/// Pointer samples retained per session
pub const POINTER_SAMPLE_CAP: usize = 100;

/// Scroll samples retained per session
pub const SCROLL_SAMPLE_CAP: usize = 50;

/// Telemetry and classification state for one visitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: String,
    started_at: DateTime<Utc>,
    page_visits: Vec<PageVisit>,
    pointer_samples: VecDeque<PointerSample>,
    scroll_samples: VecDeque<ScrollSample>,
    outbound_calls: Vec<OutboundCall>,
    interactions: Vec<Interaction>,
    scores: ScoreVector,
    confidence: f64,
    verdict: Verdict,
    evaluations: u64,
}

impl Session {
    /// Create an empty session with a zeroed score vector
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            started_at: Utc::now(),
            page_visits: Vec::new(),
            pointer_samples: VecDeque::with_capacity(POINTER_SAMPLE_CAP),
            scroll_samples: VecDeque::with_capacity(SCROLL_SAMPLE_CAP),
            outbound_calls: Vec::new(),
            interactions: Vec::new(),
            scores: ScoreVector::default(),
            confidence: 0.0,
            verdict: Verdict::Unknown,
            evaluations: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn page_visits(&self) -> &[PageVisit] {
        &self.page_visits
    }

    pub fn pointer_samples(&self) -> &VecDeque<PointerSample> {
        &self.pointer_samples
    }

    pub fn scroll_samples(&self) -> &VecDeque<ScrollSample> {
        &self.scroll_samples
    }

    pub fn outbound_calls(&self) -> &[OutboundCall] {
        &self.outbound_calls
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Score vector from the most recent evaluation
    pub fn scores(&self) -> &ScoreVector {
        &self.scores
    }

    /// Maximum score from the most recent evaluation
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Number of evaluation passes run on this session
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Record arrival on a page
    pub fn push_page_visit(&mut self, path: &str, arrived_at_ms: f64) -> Result<(), ClassifierError> {
        ensure_non_empty("path", path)?;
        ensure_timestamp(arrived_at_ms)?;

        let since_previous_ms = match self.page_visits.last() {
            Some(prev) => elapsed_since("page_visit", prev.arrived_at_ms, arrived_at_ms)?,
            None => 0.0,
        };

        self.page_visits.push(PageVisit {
            path: path.to_string(),
            arrived_at_ms,
            since_previous_ms,
            departed_at_ms: None,
            time_on_page_ms: None,
        });
        Ok(())
    }

    /// Stamp departure on the most recent page visit
    ///
    /// Returns `false` without error when no visit has been recorded.
    pub fn mark_departure(&mut self, departed_at_ms: f64) -> Result<bool, ClassifierError> {
        ensure_timestamp(departed_at_ms)?;

        let Some(visit) = self.page_visits.last_mut() else {
            return Ok(false);
        };

        let time_on_page_ms = elapsed_since("page_departure", visit.arrived_at_ms, departed_at_ms)?;
        visit.departed_at_ms = Some(departed_at_ms);
        visit.time_on_page_ms = Some(time_on_page_ms);
        Ok(true)
    }

    /// Record a pointer position, evicting the oldest sample past the cap
    pub fn push_pointer_sample(&mut self, x: f64, y: f64, timestamp_ms: f64) -> Result<(), ClassifierError> {
        ensure_finite("x", x)?;
        ensure_finite("y", y)?;
        ensure_timestamp(timestamp_ms)?;

        let since_previous_ms = match self.pointer_samples.back() {
            Some(prev) => elapsed_since("pointer_sample", prev.timestamp_ms, timestamp_ms)?,
            None => 0.0,
        };

        self.pointer_samples.push_back(PointerSample {
            x,
            y,
            timestamp_ms,
            since_previous_ms,
        });
        while self.pointer_samples.len() > POINTER_SAMPLE_CAP {
            self.pointer_samples.pop_front();
        }
        Ok(())
    }

    /// Record a scroll position, evicting the oldest sample past the cap
    pub fn push_scroll_sample(
        &mut self,
        offset_y: f64,
        viewport_height: f64,
        document_height: f64,
        timestamp_ms: f64,
    ) -> Result<(), ClassifierError> {
        ensure_finite("offset_y", offset_y)?;
        ensure_dimension("viewport_height", viewport_height)?;
        ensure_dimension("document_height", document_height)?;
        ensure_timestamp(timestamp_ms)?;

        let since_previous_ms = match self.scroll_samples.back() {
            Some(prev) => elapsed_since("scroll_sample", prev.timestamp_ms, timestamp_ms)?,
            None => 0.0,
        };

        self.scroll_samples.push_back(ScrollSample {
            offset_y,
            timestamp_ms,
            since_previous_ms,
            viewport_height,
            document_height,
        });
        while self.scroll_samples.len() > SCROLL_SAMPLE_CAP {
            self.scroll_samples.pop_front();
        }
        Ok(())
    }

    /// Record an outbound call
    pub fn push_outbound_call(&mut self, target: &str, method: &str, timestamp_ms: f64) -> Result<(), ClassifierError> {
        ensure_non_empty("target", target)?;
        ensure_non_empty("method", method)?;
        ensure_timestamp(timestamp_ms)?;

        self.outbound_calls.push(OutboundCall {
            target: target.to_string(),
            method: method.to_string(),
            timestamp_ms,
        });
        Ok(())
    }

    /// Record a free-form interaction
    pub fn push_interaction(
        &mut self,
        kind: &str,
        payload: serde_json::Value,
        timestamp_ms: f64,
    ) -> Result<(), ClassifierError> {
        ensure_non_empty("kind", kind)?;
        ensure_timestamp(timestamp_ms)?;

        self.interactions.push(Interaction {
            kind: kind.to_string(),
            payload,
            timestamp_ms,
        });
        Ok(())
    }

    /// Store the result of an evaluation pass, returning the pass number
    pub(crate) fn record_evaluation(&mut self, scores: ScoreVector, confidence: f64, verdict: Verdict) -> u64 {
        self.scores = scores;
        self.confidence = confidence;
        self.verdict = verdict;
        self.evaluations += 1;
        self.evaluations
    }

    /// Rebuild a session from an external snapshot
    ///
    /// Records are replayed through the append methods in their stored
    /// order: derived intervals are recomputed, windows are trimmed to their
    /// caps and any record an append would refuse fails the restore. The
    /// score vector and verdict start from zero; only the evaluation counter
    /// carries over.
    pub(crate) fn restore(snapshot: Session) -> Result<Self, ClassifierError> {
        if snapshot.id.trim().is_empty() {
            return Err(ClassifierError::InvalidEvent(
                "session id must not be empty".to_string(),
            ));
        }

        let mut session = Session::new(&snapshot.id);
        session.started_at = snapshot.started_at;
        session.evaluations = snapshot.evaluations;

        for visit in &snapshot.page_visits {
            session.push_page_visit(&visit.path, visit.arrived_at_ms)?;
            if let Some(departed_at_ms) = visit.departed_at_ms {
                session.mark_departure(departed_at_ms)?;
            }
        }
        for sample in &snapshot.pointer_samples {
            session.push_pointer_sample(sample.x, sample.y, sample.timestamp_ms)?;
        }
        for sample in &snapshot.scroll_samples {
            session.push_scroll_sample(
                sample.offset_y,
                sample.viewport_height,
                sample.document_height,
                sample.timestamp_ms,
            )?;
        }
        for call in &snapshot.outbound_calls {
            session.push_outbound_call(&call.target, &call.method, call.timestamp_ms)?;
        }
        for interaction in snapshot.interactions {
            session.push_interaction(&interaction.kind, interaction.payload, interaction.timestamp_ms)?;
        }

        Ok(session)
    }
}

/// Milliseconds from `previous` to `current`, rejecting time running backwards
fn elapsed_since(kind: &str, previous: f64, current: f64) -> Result<f64, ClassifierError> {
    if current < previous {
        return Err(ClassifierError::InvalidEvent(format!(
            "{}: timestamp {} precedes previous {}",
            kind, current, previous
        )));
    }
    Ok(current - previous)
}
