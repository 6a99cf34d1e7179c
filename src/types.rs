//! Core data types
//!
//! This module defines the archetypes, verdicts, telemetry records and score
//! vector that flow between the session store, the feature extractors and the
//! classification resolver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ClassifierError;
use crate::features::DerivedFeatures;

/// Behavioral archetypes a session can be classified into.
///
/// Declaration order is the registry order: it drives score-vector iteration
/// and breaks ties between equal maximum scores (earlier wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Organic human use
    Human,
    /// Automated programmatic access (agents, API clients)
    Programmatic,
    /// Human use interleaved with automation
    Mixed,
    /// Systematic scanning or crawling
    Scanner,
}

impl Archetype {
    /// All archetypes in registry order
    pub const ALL: [Archetype; 4] = [
        Archetype::Human,
        Archetype::Programmatic,
        Archetype::Mixed,
        Archetype::Scanner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Human => "human",
            Archetype::Programmatic => "programmatic",
            Archetype::Mixed => "mixed",
            Archetype::Scanner => "scanner",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Archetype::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ClassifierError::ParseError(format!("Unknown archetype: {}", s)))
    }
}

/// Resolved classification of a session
///
/// Serialized as the archetype name, or `"unknown"` when the confidence gate
/// was not passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Verdict {
    #[default]
    Unknown,
    Classified(Archetype),
}

impl Verdict {
    /// The concrete archetype, if one was reached
    pub fn archetype(&self) -> Option<Archetype> {
        match self {
            Verdict::Unknown => None,
            Verdict::Classified(archetype) => Some(*archetype),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Verdict::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Unknown => "unknown",
            Verdict::Classified(archetype) => archetype.as_str(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verdict> for String {
    fn from(verdict: Verdict) -> Self {
        verdict.as_str().to_string()
    }
}

impl TryFrom<String> for Verdict {
    type Error = ClassifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "unknown" {
            return Ok(Verdict::Unknown);
        }
        value.parse().map(Verdict::Classified)
    }
}

/// A single page visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    /// Visited path (e.g. "/pricing")
    pub path: String,
    /// Arrival time in milliseconds
    pub arrived_at_ms: f64,
    /// Milliseconds since the previous arrival (0 for the first visit)
    pub since_previous_ms: f64,
    /// Departure time in milliseconds, once recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departed_at_ms: Option<f64>,
    /// Departure minus arrival, once recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_on_page_ms: Option<f64>,
}

/// Pointer position sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: f64,
    /// Milliseconds since the previous pointer sample (0 for the first)
    pub since_previous_ms: f64,
}

/// Vertical scroll sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollSample {
    /// Vertical scroll offset in pixels
    pub offset_y: f64,
    pub timestamp_ms: f64,
    /// Milliseconds since the previous scroll sample (0 for the first)
    pub since_previous_ms: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

/// Outbound (programmatic) call made from the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCall {
    /// Call target (URL or endpoint)
    pub target: String,
    /// HTTP method or transport verb
    pub method: String,
    pub timestamp_ms: f64,
}

/// Free-form interaction record (focus changes, clicks, custom hooks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction kind tag
    pub kind: String,
    /// Opaque payload supplied by the capture layer
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp_ms: f64,
}

/// Score vector over archetypes
///
/// Always holds exactly one entry per archetype. Scores are unnormalized sums
/// of extractor contributions and may exceed 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Archetype, f64>", into = "BTreeMap<Archetype, f64>")]
pub struct ScoreVector {
    scores: BTreeMap<Archetype, f64>,
}

impl Default for ScoreVector {
    fn default() -> Self {
        Self {
            scores: Archetype::ALL.iter().map(|a| (*a, 0.0)).collect(),
        }
    }
}

impl From<BTreeMap<Archetype, f64>> for ScoreVector {
    fn from(map: BTreeMap<Archetype, f64>) -> Self {
        let mut vector = ScoreVector::default();
        for (archetype, score) in map {
            if score.is_finite() && score >= 0.0 {
                vector.scores.insert(archetype, score);
            }
        }
        vector
    }
}

impl From<ScoreVector> for BTreeMap<Archetype, f64> {
    fn from(vector: ScoreVector) -> Self {
        vector.scores
    }
}

impl ScoreVector {
    /// Zero every archetype's score
    pub fn reset(&mut self) {
        for score in self.scores.values_mut() {
            *score = 0.0;
        }
    }

    /// Add a contribution to an archetype's score
    pub fn add(&mut self, archetype: Archetype, weight: f64) {
        *self.scores.entry(archetype).or_insert(0.0) += weight;
    }

    /// Current score for an archetype
    pub fn get(&self, archetype: Archetype) -> f64 {
        self.scores.get(&archetype).copied().unwrap_or(0.0)
    }

    /// Iterate scores in registry order
    pub fn iter(&self) -> impl Iterator<Item = (Archetype, f64)> + '_ {
        self.scores.iter().map(|(a, s)| (*a, *s))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Highest-scoring archetype and its score
    ///
    /// Ties go to the archetype that comes first in registry order.
    pub fn leader(&self) -> (Archetype, f64) {
        let mut best = (Archetype::ALL[0], self.get(Archetype::ALL[0]));
        for archetype in Archetype::ALL.iter().skip(1) {
            let score = self.get(*archetype);
            if score > best.1 {
                best = (*archetype, score);
            }
        }
        best
    }
}

/// Result of one evaluation pass
///
/// This is the stable, loggable artifact handed to reaction handlers and any
/// observability collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    /// Session identifier
    pub session_id: String,
    /// Resolved verdict
    pub verdict: Verdict,
    /// Maximum score in the vector
    pub confidence: f64,
    /// Confidence threshold the verdict was gated on
    pub threshold: f64,
    /// Per-archetype scores
    pub scores: ScoreVector,
    /// Features that produced the scores
    pub features: DerivedFeatures,
    /// Evaluation pass number for this session (1-based)
    pub evaluation: u64,
    /// When this evaluation ran
    pub evaluated_at: DateTime<Utc>,
}

impl ClassificationOutcome {
    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String, ClassifierError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to an indented JSON string
    pub fn to_json_pretty(&self) -> Result<String, ClassifierError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
