//! Classifier configuration
//!
//! Everything a deployment may override: the confidence gate, per-extractor
//! minimum sample sizes, the profile table, reference exploration routes and
//! service marker paths. Extractor weights are fixed policy constants and live
//! in [`crate::features`].

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::profile::ProfileRegistry;

/// Default confidence threshold for a concrete verdict
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Minimum samples before an extractor contributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimumSamples {
    /// Page visits required by the navigation timing extractor
    pub navigation: usize,
    /// Pointer samples required by the pointer naturalness extractor
    pub pointer: usize,
    /// Scroll samples required by the scroll naturalness extractor
    pub scroll: usize,
    /// Page visits required by the exploration extractor
    pub exploration: usize,
}

impl Default for MinimumSamples {
    fn default() -> Self {
        Self {
            navigation: 2,
            pointer: 10,
            scroll: 5,
            exploration: 3,
        }
    }
}

/// Full classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum confidence for a concrete verdict
    pub confidence_threshold: f64,
    pub min_samples: MinimumSamples,
    pub profiles: ProfileRegistry,
    /// Curated "natural" exploration routes, matched as ordered subsequences
    pub reference_sequences: Vec<Vec<String>>,
    /// Paths that indicate service or automation traffic
    pub marker_paths: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_samples: MinimumSamples::default(),
            profiles: ProfileRegistry::default(),
            reference_sequences: default_reference_sequences(),
            marker_paths: default_marker_paths(),
        }
    }
}

fn default_reference_sequences() -> Vec<Vec<String>> {
    [
        &["/", "/about"][..],
        &["/", "/products", "/pricing"][..],
        &["/", "/blog"][..],
        &["/", "/docs", "/contact"][..],
    ]
    .iter()
    .map(|seq| seq.iter().map(|p| p.to_string()).collect())
    .collect()
}

fn default_marker_paths() -> Vec<String> {
    ["/api", "/llms.txt", "/robots.txt", "/sitemap.xml", "/.well-known", "/graphql"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl ClassifierConfig {
    /// Override the confidence threshold
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Check the configuration for values that would break scoring invariants
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !self.confidence_threshold.is_finite() || self.confidence_threshold <= 0.0 {
            return Err(ClassifierError::ConfigError(format!(
                "confidence_threshold must be a positive finite number, got {}",
                self.confidence_threshold
            )));
        }

        let missing = self.profiles.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|a| a.as_str()).collect();
            return Err(ClassifierError::ConfigError(format!(
                "profile table is missing archetypes: {}",
                names.join(", ")
            )));
        }

        for (archetype, profile) in self.profiles.iter() {
            if !profile.navigation_speed_ms.is_valid() {
                return Err(ClassifierError::ConfigError(format!(
                    "invalid navigation_speed_ms range for {}",
                    archetype
                )));
            }
        }

        if self.reference_sequences.iter().any(|seq| seq.is_empty()) {
            return Err(ClassifierError::ConfigError(
                "reference_sequences must not contain empty sequences".to_string(),
            ));
        }

        if self.marker_paths.iter().any(|p| p.is_empty()) {
            return Err(ClassifierError::ConfigError(
                "marker_paths must not contain empty paths".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a visited path is a service/automation marker
    ///
    /// A path matches when it equals a marker or continues it with `/`.
    pub fn is_marker_path(&self, path: &str) -> bool {
        self.marker_paths.iter().any(|marker| {
            path == marker
                || (path.starts_with(marker.as_str())
                    && path[marker.len()..].starts_with('/'))
        })
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, ClassifierError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Archetype;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClassifierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.min_samples.pointer, 10);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ClassifierConfig::from_json(r#"{"confidence_threshold": 0.5}"#).unwrap();
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.min_samples, MinimumSamples::default());
        assert_eq!(config.marker_paths, default_marker_paths());

        let config =
            ClassifierConfig::from_json(r#"{"min_samples": {"scroll": 8}}"#).unwrap();
        assert_eq!(config.min_samples.scroll, 8);
        assert_eq!(config.min_samples.navigation, 2);
    }

    #[test]
    fn test_config_round_trip() {
        let config = ClassifierConfig::default().with_confidence_threshold(0.6);
        let json = config.to_json().unwrap();
        let loaded = ClassifierConfig::from_json(&json).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = ClassifierConfig::default().with_confidence_threshold(f64::NAN);
        assert!(matches!(config.validate(), Err(ClassifierError::ConfigError(_))));

        let config = ClassifierConfig::default().with_confidence_threshold(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_incomplete_profile_table() {
        let json = r#"{"profiles": {"human": {
            "navigation_speed_ms": {"min": 2000.0, "max": 60000.0},
            "natural_movement": true,
            "pause_points": true,
            "exploration": "wandering",
            "programmatic_calls": false,
            "return_frequency": "occasional",
            "session_duration_ms": {"min": 30000.0, "max": 1800000.0},
            "path_entropy": "high",
            "focus": "sustained"
        }}}"#;

        let err = ClassifierConfig::from_json(json).unwrap_err();
        assert!(err.to_string().contains("programmatic"));
    }

    #[test]
    fn test_rejects_inverted_navigation_range() {
        let mut config = ClassifierConfig::default();
        let mut profile = config.profiles.get(Archetype::Scanner).unwrap().clone();
        profile.navigation_speed_ms = crate::profile::MillisRange::new(500.0, 100.0);
        config.profiles.set(Archetype::Scanner, profile);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_reference_sequence() {
        let mut config = ClassifierConfig::default();
        config.reference_sequences.push(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_marker_path_matching() {
        let config = ClassifierConfig::default();
        assert!(config.is_marker_path("/api"));
        assert!(config.is_marker_path("/api/v1/users"));
        assert!(config.is_marker_path("/robots.txt"));
        assert!(config.is_marker_path("/.well-known/ai-plugin.json"));
        assert!(!config.is_marker_path("/apiary"));
        assert!(!config.is_marker_path("/docs/api"));
    }
}
