//! Archetype profile registry
//!
//! Reference behavioral parameters per archetype. Profiles are pure data: they
//! are built once with the configuration and never mutated while sessions are
//! being scored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Archetype;

/// Inclusive millisecond range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MillisRange {
    pub min: f64,
    pub max: f64,
}

impl MillisRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within `[min, max]`
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Range is well-formed (finite, non-negative, min <= max)
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min >= 0.0 && self.min <= self.max
    }
}

/// Expected exploration pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationPattern {
    Wandering,
    Targeted,
    Mixed,
    Exhaustive,
}

/// Expected return frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnFrequency {
    Rare,
    Occasional,
    Frequent,
}

/// Expected path entropy band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyLevel {
    Low,
    Medium,
    High,
}

/// Expected focus pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusPattern {
    Sustained,
    Switching,
    Absent,
}

/// Reference behavioral profile for one archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeProfile {
    /// Typical milliseconds between navigations
    pub navigation_speed_ms: MillisRange,
    /// Pointer movement shows natural speed variation
    pub natural_movement: bool,
    /// Scrolling has pause points
    pub pause_points: bool,
    pub exploration: ExplorationPattern,
    /// Issues programmatic outbound calls
    pub programmatic_calls: bool,
    pub return_frequency: ReturnFrequency,
    pub session_duration_ms: MillisRange,
    pub path_entropy: EntropyLevel,
    pub focus: FocusPattern,
}

/// Profile table keyed by archetype, iterated in registry order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileRegistry {
    profiles: BTreeMap<Archetype, ArchetypeProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();

        profiles.insert(
            Archetype::Human,
            ArchetypeProfile {
                navigation_speed_ms: MillisRange::new(2_000.0, 60_000.0),
                natural_movement: true,
                pause_points: true,
                exploration: ExplorationPattern::Wandering,
                programmatic_calls: false,
                return_frequency: ReturnFrequency::Occasional,
                session_duration_ms: MillisRange::new(30_000.0, 1_800_000.0),
                path_entropy: EntropyLevel::High,
                focus: FocusPattern::Sustained,
            },
        );
        profiles.insert(
            Archetype::Programmatic,
            ArchetypeProfile {
                navigation_speed_ms: MillisRange::new(100.0, 1_500.0),
                natural_movement: false,
                pause_points: false,
                exploration: ExplorationPattern::Targeted,
                programmatic_calls: true,
                return_frequency: ReturnFrequency::Frequent,
                session_duration_ms: MillisRange::new(1_000.0, 300_000.0),
                path_entropy: EntropyLevel::Low,
                focus: FocusPattern::Absent,
            },
        );
        profiles.insert(
            Archetype::Mixed,
            ArchetypeProfile {
                navigation_speed_ms: MillisRange::new(1_000.0, 10_000.0),
                natural_movement: true,
                pause_points: false,
                exploration: ExplorationPattern::Mixed,
                programmatic_calls: true,
                return_frequency: ReturnFrequency::Frequent,
                session_duration_ms: MillisRange::new(10_000.0, 1_200_000.0),
                path_entropy: EntropyLevel::Medium,
                focus: FocusPattern::Switching,
            },
        );
        profiles.insert(
            Archetype::Scanner,
            ArchetypeProfile {
                navigation_speed_ms: MillisRange::new(0.0, 200.0),
                natural_movement: false,
                pause_points: false,
                exploration: ExplorationPattern::Exhaustive,
                programmatic_calls: false,
                return_frequency: ReturnFrequency::Rare,
                session_duration_ms: MillisRange::new(1_000.0, 3_600_000.0),
                path_entropy: EntropyLevel::Low,
                focus: FocusPattern::Absent,
            },
        );

        Self { profiles }
    }
}

impl ProfileRegistry {
    /// Profile for an archetype
    pub fn get(&self, archetype: Archetype) -> Option<&ArchetypeProfile> {
        self.profiles.get(&archetype)
    }

    /// Iterate profiles in registry order
    pub fn iter(&self) -> impl Iterator<Item = (Archetype, &ArchetypeProfile)> {
        self.profiles.iter().map(|(a, p)| (*a, p))
    }

    /// Replace one archetype's profile
    pub fn set(&mut self, archetype: Archetype, profile: ArchetypeProfile) {
        self.profiles.insert(archetype, profile);
    }

    /// Archetypes without a profile
    pub fn missing(&self) -> Vec<Archetype> {
        Archetype::ALL
            .iter()
            .copied()
            .filter(|a| !self.profiles.contains_key(a))
            .collect()
    }

    /// Archetypes whose navigation-speed range contains `interval_ms`
    pub fn navigation_matches(&self, interval_ms: f64) -> Vec<Archetype> {
        self.iter()
            .filter(|(_, p)| p.navigation_speed_ms.contains(interval_ms))
            .map(|(a, _)| a)
            .collect()
    }
}
