//! Behavioral feature extraction
//!
//! Five independent extractors read a session and derive a typed feature
//! record. Each record adds fixed-weight contributions to the score vector; no
//! extractor ever overwrites a score. An extractor without enough samples
//! abstains (`None`) and contributes nothing.
//!
//! The weights and thresholds below are the tuned reference model and must not
//! drift: they are policy constants, not derived values.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::ClassifierConfig;
use crate::session::Session;
use crate::types::{Archetype, ScoreVector};

/// Added to every archetype whose navigation range contains the mean interval
pub const NAVIGATION_MATCH_WEIGHT: f64 = 0.3;

/// Pointer speed variance above which movement counts as natural
pub const NATURAL_MOVEMENT_VARIANCE: f64 = 50.0;

/// Scroll speed variance above which scrolling counts as natural
pub const NATURAL_SCROLL_VARIANCE: f64 = 10.0;

/// Gap between scroll samples that counts as a reading pause (ms)
pub const SCROLL_PAUSE_MS: f64 = 1_000.0;

/// Elapsed time substituted when consecutive samples share a timestamp
const MIN_ELAPSED_MS: f64 = 1.0;

/// Visits of a single path beyond which it counts as repeated
const PATH_REPEAT_LIMIT: usize = 2;

/// Feature extractor for session telemetry
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Run every extractor over a session
    pub fn derive(session: &Session, config: &ClassifierConfig) -> DerivedFeatures {
        DerivedFeatures {
            navigation: NavigationFeatures::extract(session, config),
            pointer: PointerFeatures::extract(session, config),
            scroll: ScrollFeatures::extract(session, config),
            exploration: ExplorationFeatures::extract(session, config),
            outbound: OutboundFeatures::extract(session),
        }
    }
}

/// Output of all extractors for one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub navigation: Option<NavigationFeatures>,
    pub pointer: Option<PointerFeatures>,
    pub scroll: Option<ScrollFeatures>,
    pub exploration: Option<ExplorationFeatures>,
    pub outbound: OutboundFeatures,
}

impl DerivedFeatures {
    /// Add every extractor's contribution to `scores`
    pub fn contribute(&self, scores: &mut ScoreVector) {
        if let Some(navigation) = &self.navigation {
            navigation.contribute(scores);
        }
        if let Some(pointer) = &self.pointer {
            pointer.contribute(scores);
        }
        if let Some(scroll) = &self.scroll {
            scroll.contribute(scores);
        }
        if let Some(exploration) = &self.exploration {
            exploration.contribute(scores);
        }
        self.outbound.contribute(scores);
    }

    /// Names of extractors that abstained for lack of samples
    pub fn abstained(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.navigation.is_none() {
            names.push("navigation");
        }
        if self.pointer.is_none() {
            names.push("pointer");
        }
        if self.scroll.is_none() {
            names.push("scroll");
        }
        if self.exploration.is_none() {
            names.push("exploration");
        }
        names
    }
}

// ============================================================================
// Navigation timing
// ============================================================================

/// Mean time between page navigations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationFeatures {
    pub visit_count: usize,
    /// Mean of the positive inter-navigation intervals
    pub mean_interval_ms: f64,
    /// Archetypes whose navigation range contains the mean
    pub matching: Vec<Archetype>,
}

impl NavigationFeatures {
    /// Requires the configured number of page visits (default 2) and at least
    /// one positive interval
    pub fn extract(session: &Session, config: &ClassifierConfig) -> Option<Self> {
        let visits = session.page_visits();
        if visits.len() < config.min_samples.navigation.max(2) {
            return None;
        }

        let intervals: Vec<f64> = visits
            .iter()
            .map(|v| v.since_previous_ms)
            .filter(|&ms| ms > 0.0)
            .collect();
        if intervals.is_empty() {
            return None;
        }

        let mean_interval_ms = mean(&intervals);
        Some(Self {
            visit_count: visits.len(),
            mean_interval_ms,
            matching: config.profiles.navigation_matches(mean_interval_ms),
        })
    }

    pub fn contribute(&self, scores: &mut ScoreVector) {
        for archetype in &self.matching {
            scores.add(*archetype, NAVIGATION_MATCH_WEIGHT);
        }
    }
}

// ============================================================================
// Pointer naturalness
// ============================================================================

/// Variation in pointer speed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerFeatures {
    pub sample_count: usize,
    pub mean_speed: f64,
    /// Population variance of per-step speed
    pub speed_variance: f64,
    /// Variance exceeds [`NATURAL_MOVEMENT_VARIANCE`]
    pub natural: bool,
}

impl PointerFeatures {
    /// Requires the configured number of pointer samples (default 10)
    pub fn extract(session: &Session, config: &ClassifierConfig) -> Option<Self> {
        let samples = session.pointer_samples();
        if samples.len() < config.min_samples.pointer.max(2) {
            return None;
        }

        let points: Vec<_> = samples.iter().collect();
        let speeds: Vec<f64> = points
            .windows(2)
            .map(|pair| {
                let (a, b) = (pair[0], pair[1]);
                let distance = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
                distance / elapsed_or_min(b.timestamp_ms - a.timestamp_ms)
            })
            .collect();

        let speed_variance = population_variance(&speeds);
        Some(Self {
            sample_count: samples.len(),
            mean_speed: mean(&speeds),
            speed_variance,
            natural: speed_variance > NATURAL_MOVEMENT_VARIANCE,
        })
    }

    pub fn contribute(&self, scores: &mut ScoreVector) {
        if self.natural {
            scores.add(Archetype::Human, 0.25);
            scores.add(Archetype::Mixed, 0.15);
        } else {
            scores.add(Archetype::Programmatic, 0.2);
            scores.add(Archetype::Scanner, 0.3);
        }
    }
}

// ============================================================================
// Scroll naturalness
// ============================================================================

/// Variation in scroll speed and presence of reading pauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollFeatures {
    pub sample_count: usize,
    /// Population variance of per-step scroll speed
    pub speed_variance: f64,
    /// Some gap between samples exceeds [`SCROLL_PAUSE_MS`]
    pub has_pause: bool,
    /// Deepest point reached, as a fraction of the scrollable document
    pub max_depth: f64,
    /// Variance exceeds [`NATURAL_SCROLL_VARIANCE`] and a pause exists
    pub natural: bool,
}

impl ScrollFeatures {
    /// Requires the configured number of scroll samples (default 5)
    pub fn extract(session: &Session, config: &ClassifierConfig) -> Option<Self> {
        let samples = session.scroll_samples();
        if samples.len() < config.min_samples.scroll.max(2) {
            return None;
        }

        let points: Vec<_> = samples.iter().collect();
        let mut speeds = Vec::with_capacity(points.len() - 1);
        let mut has_pause = false;
        for pair in points.windows(2) {
            let elapsed = pair[1].timestamp_ms - pair[0].timestamp_ms;
            if elapsed > SCROLL_PAUSE_MS {
                has_pause = true;
            }
            speeds.push((pair[1].offset_y - pair[0].offset_y).abs() / elapsed_or_min(elapsed));
        }

        let max_depth = points
            .iter()
            .map(|s| scroll_depth(s.offset_y, s.viewport_height, s.document_height))
            .fold(0.0, f64::max);

        let speed_variance = population_variance(&speeds);
        Some(Self {
            sample_count: samples.len(),
            speed_variance,
            has_pause,
            max_depth,
            natural: speed_variance > NATURAL_SCROLL_VARIANCE && has_pause,
        })
    }

    pub fn contribute(&self, scores: &mut ScoreVector) {
        if self.natural {
            scores.add(Archetype::Human, 0.2);
            scores.add(Archetype::Mixed, 0.15);
        } else {
            scores.add(Archetype::Programmatic, 0.15);
            scores.add(Archetype::Scanner, 0.25);
        }
    }
}

/// Fraction of the scrollable range reached (0-1)
fn scroll_depth(offset_y: f64, viewport_height: f64, document_height: f64) -> f64 {
    let scrollable = document_height - viewport_height;
    if scrollable <= 0.0 {
        return 1.0;
    }
    (offset_y / scrollable).clamp(0.0, 1.0)
}

// ============================================================================
// Exploration / path entropy
// ============================================================================

/// Shape of the visited-path sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationFeatures {
    pub visit_count: usize,
    pub distinct_paths: usize,
    /// Distinct paths / total visits
    pub path_entropy: f64,
    /// A reference route appears as an ordered subsequence of the visits
    pub matches_reference: bool,
    /// A service/automation marker path was visited
    pub has_marker_path: bool,
    /// Some single path was visited more than twice
    pub repeated_path: bool,
}

impl ExplorationFeatures {
    /// Requires the configured number of page visits (default 3)
    pub fn extract(session: &Session, config: &ClassifierConfig) -> Option<Self> {
        let visits = session.page_visits();
        if visits.is_empty() || visits.len() < config.min_samples.exploration {
            return None;
        }

        let paths: Vec<&str> = visits.iter().map(|v| v.path.as_str()).collect();
        let distinct: HashSet<&str> = paths.iter().copied().collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for &path in &paths {
            *counts.entry(path).or_insert(0) += 1;
        }

        Some(Self {
            visit_count: paths.len(),
            distinct_paths: distinct.len(),
            path_entropy: distinct.len() as f64 / paths.len() as f64,
            matches_reference: config
                .reference_sequences
                .iter()
                .any(|reference| is_subsequence(reference, &paths)),
            has_marker_path: distinct.iter().any(|p| config.is_marker_path(p)),
            repeated_path: counts.values().any(|&n| n > PATH_REPEAT_LIMIT),
        })
    }

    pub fn contribute(&self, scores: &mut ScoreVector) {
        if self.path_entropy > 0.7 && self.matches_reference {
            scores.add(Archetype::Human, 0.25);
        }
        if self.has_marker_path && self.path_entropy < 0.5 {
            scores.add(Archetype::Programmatic, 0.3);
        }
        if self.has_marker_path && self.matches_reference {
            scores.add(Archetype::Mixed, 0.25);
        }
        if self.path_entropy < 0.3 && self.visit_count > 5 {
            scores.add(Archetype::Scanner, 0.3);
        }
    }
}

/// Whether `reference` occurs in `visited` in order, not necessarily contiguously
fn is_subsequence(reference: &[String], visited: &[&str]) -> bool {
    let mut remaining = reference.iter().peekable();
    for path in visited {
        match remaining.peek() {
            Some(next) if next.as_str() == *path => {
                remaining.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    remaining.peek().is_none()
}

// ============================================================================
// Outbound call ratio
// ============================================================================

/// Outbound calls relative to page visits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboundFeatures {
    pub call_count: usize,
    pub page_visit_count: usize,
    /// Calls / max(page visits, 1)
    pub call_ratio: f64,
}

impl OutboundFeatures {
    /// Always runs; the ratio is defined for an empty session
    pub fn extract(session: &Session) -> Self {
        let call_count = session.outbound_calls().len();
        let page_visit_count = session.page_visits().len();
        Self {
            call_count,
            page_visit_count,
            call_ratio: call_count as f64 / page_visit_count.max(1) as f64,
        }
    }

    pub fn contribute(&self, scores: &mut ScoreVector) {
        if self.call_ratio > 0.5 {
            scores.add(Archetype::Programmatic, 0.2);
            scores.add(Archetype::Scanner, 0.15);
        } else if self.call_ratio > 0.2 {
            scores.add(Archetype::Mixed, 0.2);
        } else if self.call_ratio == 0.0 && self.page_visit_count > 3 {
            scores.add(Archetype::Human, 0.15);
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

fn elapsed_or_min(elapsed_ms: f64) -> f64 {
    if elapsed_ms > 0.0 {
        elapsed_ms
    } else {
        MIN_ELAPSED_MS
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by n)
fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ClassifierConfig {
        ClassifierConfig::default()
    }

    fn session_with_paths(paths: &[&str], interval_ms: f64) -> Session {
        let mut session = Session::new("test");
        for (i, path) in paths.iter().enumerate() {
            session.push_page_visit(path, i as f64 * interval_ms).unwrap();
        }
        session
    }

    fn scores_of(apply: impl FnOnce(&mut ScoreVector)) -> ScoreVector {
        let mut scores = ScoreVector::default();
        apply(&mut scores);
        scores
    }

    #[test]
    fn test_population_variance() {
        assert_eq!(population_variance(&[]), 0.0);
        assert_eq!(population_variance(&[5.0, 5.0, 5.0]), 0.0);
        // mean 5, squared deviations 9+1+1+9 = 20, /4 = 5
        assert!((population_variance(&[2.0, 4.0, 6.0, 8.0]) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_subsequence() {
        let reference: Vec<String> = vec!["/".into(), "/products".into(), "/pricing".into()];
        assert!(is_subsequence(&reference, &["/", "/products", "/pricing"]));
        assert!(is_subsequence(&reference, &["/", "/blog", "/products", "/faq", "/pricing"]));
        assert!(!is_subsequence(&reference, &["/products", "/", "/pricing"]));
        assert!(!is_subsequence(&reference, &["/", "/products"]));
    }

    #[test]
    fn test_navigation_requires_two_visits() {
        let session = session_with_paths(&["/"], 300.0);
        assert!(NavigationFeatures::extract(&session, &config()).is_none());
    }

    #[test]
    fn test_navigation_ignores_zero_intervals() {
        let mut session = Session::new("test");
        session.push_page_visit("/", 1_000.0).unwrap();
        session.push_page_visit("/a", 1_000.0).unwrap();
        assert!(NavigationFeatures::extract(&session, &config()).is_none());

        session.push_page_visit("/b", 1_300.0).unwrap();
        let nav = NavigationFeatures::extract(&session, &config()).unwrap();
        assert_eq!(nav.mean_interval_ms, 300.0);
    }

    #[test]
    fn test_navigation_contributes_to_matching_ranges() {
        let session = session_with_paths(&["/", "/pricing"], 300.0);
        let nav = NavigationFeatures::extract(&session, &config()).unwrap();
        assert_eq!(nav.mean_interval_ms, 300.0);
        assert_eq!(nav.matching, vec![Archetype::Programmatic]);

        let scores = scores_of(|s| nav.contribute(s));
        assert_eq!(scores.get(Archetype::Programmatic), 0.3);
        assert_eq!(scores.get(Archetype::Human), 0.0);
    }

    #[test]
    fn test_pointer_requires_minimum_samples() {
        let mut session = Session::new("test");
        for i in 0..9 {
            session.push_pointer_sample(i as f64, 0.0, i as f64 * 10.0).unwrap();
        }
        assert!(PointerFeatures::extract(&session, &config()).is_none());

        session.push_pointer_sample(9.0, 0.0, 90.0).unwrap();
        assert!(PointerFeatures::extract(&session, &config()).is_some());
    }

    #[test]
    fn test_uniform_pointer_movement_is_mechanical() {
        let mut session = Session::new("test");
        for i in 0..20 {
            session.push_pointer_sample(i as f64 * 10.0, i as f64 * 10.0, i as f64 * 16.0).unwrap();
        }

        let pointer = PointerFeatures::extract(&session, &config()).unwrap();
        assert!(pointer.speed_variance < 1e-9);
        assert!(!pointer.natural);

        let scores = scores_of(|s| pointer.contribute(s));
        assert_eq!(scores.get(Archetype::Programmatic), 0.2);
        assert_eq!(scores.get(Archetype::Scanner), 0.3);
        assert_eq!(scores.get(Archetype::Human), 0.0);
    }

    #[test]
    fn test_erratic_pointer_movement_is_natural() {
        let mut session = Session::new("test");
        // Alternate 5px creeps with 300px flicks, all 10ms apart
        let mut x = 0.0;
        for i in 0..20 {
            x += if i % 2 == 0 { 5.0 } else { 300.0 };
            session.push_pointer_sample(x, 0.0, i as f64 * 10.0).unwrap();
        }

        let pointer = PointerFeatures::extract(&session, &config()).unwrap();
        assert!(pointer.natural, "variance {}", pointer.speed_variance);

        let scores = scores_of(|s| pointer.contribute(s));
        assert_eq!(scores.get(Archetype::Human), 0.25);
        assert_eq!(scores.get(Archetype::Mixed), 0.15);
    }

    #[test]
    fn test_pointer_variance_at_threshold_is_not_natural() {
        // Speeds 30, 0 and seven 15s: mean 15, variance 450 / 9 = 50
        let steps = [300.0, 0.0, 150.0, 150.0, 150.0, 150.0, 150.0, 150.0, 150.0];
        let mut session = Session::new("test");
        let mut x = 0.0;
        session.push_pointer_sample(x, 0.0, 0.0).unwrap();
        for (i, step) in steps.iter().enumerate() {
            x += step;
            session.push_pointer_sample(x, 0.0, (i + 1) as f64 * 10.0).unwrap();
        }

        let pointer = PointerFeatures::extract(&session, &config()).unwrap();
        assert_eq!(pointer.speed_variance, NATURAL_MOVEMENT_VARIANCE);
        assert!(!pointer.natural);

        let scores = scores_of(|s| pointer.contribute(s));
        assert_eq!(scores.get(Archetype::Human), 0.0);
        assert_eq!(scores.get(Archetype::Scanner), 0.3);
    }

    #[test]
    fn test_pointer_zero_elapsed_uses_one_ms() {
        let mut session = Session::new("test");
        for i in 0..10 {
            session.push_pointer_sample(i as f64 * 3.0, 4.0 * i as f64, 0.0).unwrap();
        }
        // Every step is a 3-4-5 triangle over a 1ms floor
        let pointer = PointerFeatures::extract(&session, &config()).unwrap();
        assert!((pointer.mean_speed - 5.0).abs() < 1e-9);
        assert!(pointer.speed_variance.is_finite());
    }

    #[test]
    fn test_scroll_natural_needs_variance_and_pause() {
        let mut session = Session::new("test");
        let offsets = [0.0, 400.0, 450.0, 1_400.0, 1_420.0, 2_600.0];
        let times = [0.0, 100.0, 200.0, 2_000.0, 2_100.0, 2_200.0];
        for (offset, t) in offsets.iter().zip(times.iter()) {
            session.push_scroll_sample(*offset, 800.0, 4_000.0, *t).unwrap();
        }

        let scroll = ScrollFeatures::extract(&session, &config()).unwrap();
        assert!(scroll.has_pause);
        assert!(scroll.speed_variance > NATURAL_SCROLL_VARIANCE);
        assert!(scroll.natural);

        let scores = scores_of(|s| scroll.contribute(s));
        assert_eq!(scores.get(Archetype::Human), 0.2);
        assert_eq!(scores.get(Archetype::Mixed), 0.15);
    }

    #[test]
    fn test_scroll_without_pause_is_mechanical() {
        let mut session = Session::new("test");
        for i in 0..8 {
            let offset = if i % 2 == 0 { i as f64 * 10.0 } else { i as f64 * 500.0 };
            session.push_scroll_sample(offset, 800.0, 10_000.0, i as f64 * 100.0).unwrap();
        }

        let scroll = ScrollFeatures::extract(&session, &config()).unwrap();
        assert!(!scroll.has_pause);
        assert!(!scroll.natural);

        let scores = scores_of(|s| scroll.contribute(s));
        assert_eq!(scores.get(Archetype::Programmatic), 0.15);
        assert_eq!(scores.get(Archetype::Scanner), 0.25);
    }

    #[test]
    fn test_scroll_pause_must_exceed_one_second() {
        let offsets = [0.0, 1_000.0, 1_010.0, 3_000.0, 3_010.0];
        let cases = [(1_200.0, false), (1_201.0, true)];
        for (resume_at, natural) in cases {
            let times = [0.0, 100.0, 200.0, resume_at, resume_at + 100.0];
            let mut session = Session::new("test");
            for (offset, t) in offsets.iter().zip(times.iter()) {
                session.push_scroll_sample(*offset, 800.0, 4_000.0, *t).unwrap();
            }

            let scroll = ScrollFeatures::extract(&session, &config()).unwrap();
            assert!(scroll.speed_variance > NATURAL_SCROLL_VARIANCE);
            assert_eq!(scroll.has_pause, natural, "resume at {}", resume_at);
            assert_eq!(scroll.natural, natural, "resume at {}", resume_at);
        }
    }

    #[test]
    fn test_scroll_depth() {
        assert_eq!(scroll_depth(1_600.0, 800.0, 2_400.0), 1.0);
        assert_eq!(scroll_depth(800.0, 800.0, 2_400.0), 0.5);
        assert_eq!(scroll_depth(0.0, 1_000.0, 500.0), 1.0);
    }

    #[test]
    fn test_exploration_natural_route() {
        let session = session_with_paths(&["/", "/products", "/features", "/pricing"], 4_000.0);
        let exploration = ExplorationFeatures::extract(&session, &config()).unwrap();
        assert_eq!(exploration.path_entropy, 1.0);
        assert!(exploration.matches_reference);
        assert!(!exploration.has_marker_path);
        assert!(!exploration.repeated_path);

        let scores = scores_of(|s| exploration.contribute(s));
        assert_eq!(scores.get(Archetype::Human), 0.25);
        assert_eq!(scores.get(Archetype::Mixed), 0.0);
    }

    #[test]
    fn test_exploration_marker_with_low_entropy() {
        let session = session_with_paths(&["/api/items", "/api/items", "/api/items", "/api/users"], 200.0);
        let exploration = ExplorationFeatures::extract(&session, &config()).unwrap();
        assert_eq!(exploration.path_entropy, 0.5);
        assert!(exploration.has_marker_path);
        assert!(exploration.repeated_path);

        // Entropy of exactly 0.5 is not below the marker threshold
        let scores = scores_of(|s| exploration.contribute(s));
        assert_eq!(scores.get(Archetype::Programmatic), 0.0);

        let session = session_with_paths(
            &["/api/items", "/api/items", "/api/items", "/api/items", "/api/users"],
            200.0,
        );
        let exploration = ExplorationFeatures::extract(&session, &config()).unwrap();
        let scores = scores_of(|s| exploration.contribute(s));
        assert_eq!(scores.get(Archetype::Programmatic), 0.3);
    }

    #[test]
    fn test_exploration_marker_with_natural_route_is_mixed() {
        let session = session_with_paths(&["/", "/blog", "/api/feed"], 3_000.0);
        let exploration = ExplorationFeatures::extract(&session, &config()).unwrap();
        let scores = scores_of(|s| exploration.contribute(s));
        assert_eq!(scores.get(Archetype::Mixed), 0.25);
        assert_eq!(scores.get(Archetype::Human), 0.25);
    }

    #[test]
    fn test_exploration_low_entropy_scan() {
        let paths = ["/item", "/item", "/item", "/list", "/item", "/item", "/list", "/item"];
        let session = session_with_paths(&paths, 50.0);
        let exploration = ExplorationFeatures::extract(&session, &config()).unwrap();
        assert!(exploration.path_entropy < 0.3);

        let scores = scores_of(|s| exploration.contribute(s));
        assert_eq!(scores.get(Archetype::Scanner), 0.3);
    }

    #[test]
    fn test_exploration_entropy_bounds_are_strict() {
        // 7 distinct paths over 10 visits, starting on a reference route
        let paths = ["/", "/about", "/a", "/b", "/c", "/d", "/e", "/a", "/b", "/c"];
        let exploration = ExplorationFeatures::extract(&session_with_paths(&paths, 3_000.0), &config()).unwrap();
        assert_eq!(exploration.path_entropy, 0.7);
        assert!(exploration.matches_reference);
        let scores = scores_of(|s| exploration.contribute(s));
        assert_eq!(scores.get(Archetype::Human), 0.0);

        // 3 distinct paths over 10 visits
        let paths = ["/x", "/y", "/z", "/x", "/y", "/z", "/x", "/y", "/z", "/x"];
        let exploration = ExplorationFeatures::extract(&session_with_paths(&paths, 50.0), &config()).unwrap();
        assert_eq!(exploration.path_entropy, 0.3);
        let scores = scores_of(|s| exploration.contribute(s));
        assert_eq!(scores.get(Archetype::Scanner), 0.0);

        // Low entropy over exactly five visits is not a scan yet
        let paths = ["/x", "/x", "/x", "/x", "/x"];
        let exploration = ExplorationFeatures::extract(&session_with_paths(&paths, 50.0), &config()).unwrap();
        assert_eq!(exploration.path_entropy, 0.2);
        let scores = scores_of(|s| exploration.contribute(s));
        assert_eq!(scores.get(Archetype::Scanner), 0.0);
    }

    #[test]
    fn test_exploration_requires_three_visits() {
        let session = session_with_paths(&["/", "/about"], 3_000.0);
        assert!(ExplorationFeatures::extract(&session, &config()).is_none());
    }

    #[test]
    fn test_outbound_ratio_bands() {
        let cases = [
            (10, 4, Archetype::Programmatic, 0.2),
            (2, 5, Archetype::Mixed, 0.2),
            (0, 4, Archetype::Human, 0.15),
        ];
        for (calls, visits, archetype, expected) in cases {
            let features = OutboundFeatures {
                call_count: calls,
                page_visit_count: visits,
                call_ratio: calls as f64 / visits.max(1) as f64,
            };
            let scores = scores_of(|s| features.contribute(s));
            assert_eq!(scores.get(archetype), expected, "calls={} visits={}", calls, visits);
        }

        // Few visits and no calls is not evidence of anything
        let quiet = OutboundFeatures {
            call_count: 0,
            page_visit_count: 3,
            call_ratio: 0.0,
        };
        let scores = scores_of(|s| quiet.contribute(s));
        assert!(scores.iter().all(|(_, s)| s == 0.0));
    }

    #[test]
    fn test_outbound_ratio_boundaries_fall_to_lower_band() {
        // (calls, visits, programmatic, mixed)
        let cases = [(2, 4, 0.0, 0.2), (1, 5, 0.0, 0.0), (3, 5, 0.2, 0.0)];
        for (calls, visits, programmatic, mixed) in cases {
            let mut session = session_with_paths(&["/", "/a", "/b", "/c", "/d"][..visits], 1_000.0);
            for i in 0..calls {
                session.push_outbound_call("/api/items", "GET", i as f64).unwrap();
            }
            let outbound = OutboundFeatures::extract(&session);
            let scores = scores_of(|s| outbound.contribute(s));
            assert_eq!(scores.get(Archetype::Programmatic), programmatic, "ratio {}", outbound.call_ratio);
            assert_eq!(scores.get(Archetype::Mixed), mixed, "ratio {}", outbound.call_ratio);
            assert_eq!(scores.get(Archetype::Human), 0.0);
        }
    }

    #[test]
    fn test_outbound_ratio_without_visits() {
        let mut session = Session::new("test");
        session.push_outbound_call("/api/a", "GET", 0.0).unwrap();
        let outbound = OutboundFeatures::extract(&session);
        assert_eq!(outbound.call_ratio, 1.0);

        let scores = scores_of(|s| outbound.contribute(s));
        assert_eq!(scores.get(Archetype::Scanner), 0.15);
    }

    #[test]
    fn test_derive_reports_abstentions() {
        let session = session_with_paths(&["/", "/about"], 3_000.0);
        let features = FeatureDeriver::derive(&session, &config());
        assert!(features.navigation.is_some());
        assert_eq!(features.abstained(), vec!["pointer", "scroll", "exploration"]);
    }
}
