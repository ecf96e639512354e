//! Limiter configuration: algorithm selectors, per-algorithm parameters,
//! and the YAML file format for declaring named limiters.
//!
//! All parameter validation lives here and runs at construction time via
//! [`LimiterConfig::validate`]; the limiter hot path assumes validated
//! configuration and re-checks nothing.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FloodgateError, Result};

/// The closed set of admission-control algorithms.
///
/// Any other selector is a configuration error; adding a variant is a
/// deliberate API change, not an extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterKind {
    /// Bound the count of admissions within a trailing time window.
    SlidingWindow,
    /// Continuously refill a capacity-bounded pool of tokens, one per admission.
    TokenBucket,
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimiterKind::SlidingWindow => write!(f, "sliding_window"),
            LimiterKind::TokenBucket => write!(f, "token_bucket"),
        }
    }
}

impl FromStr for LimiterKind {
    type Err = FloodgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sliding_window" => Ok(LimiterKind::SlidingWindow),
            "token_bucket" => Ok(LimiterKind::TokenBucket),
            other => Err(FloodgateError::Config(format!(
                "unknown rate limiter kind `{other}` (expected `sliding_window` or `token_bucket`)"
            ))),
        }
    }
}

/// Construction parameters for a single limiter, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum LimiterConfig {
    /// Sliding-window parameters.
    SlidingWindow {
        /// Maximum admissions within any trailing window.
        max_requests: usize,
        /// Window width in seconds.
        window_secs: f64,
    },
    /// Token-bucket parameters.
    TokenBucket {
        /// Maximum (and initial) token balance per key.
        capacity: f64,
        /// Refill rate in tokens per second.
        refill_rate: f64,
    },
}

impl LimiterConfig {
    /// Convenience constructor for a sliding-window configuration.
    pub fn sliding_window(max_requests: usize, window: Duration) -> Self {
        LimiterConfig::SlidingWindow {
            max_requests,
            window_secs: window.as_secs_f64(),
        }
    }

    /// Convenience constructor for a token-bucket configuration.
    pub fn token_bucket(capacity: f64, refill_rate: f64) -> Self {
        LimiterConfig::TokenBucket {
            capacity,
            refill_rate,
        }
    }

    /// The algorithm this configuration selects.
    pub fn kind(&self) -> LimiterKind {
        match self {
            LimiterConfig::SlidingWindow { .. } => LimiterKind::SlidingWindow,
            LimiterConfig::TokenBucket { .. } => LimiterKind::TokenBucket,
        }
    }

    /// Check that all parameters are positive and finite.
    ///
    /// Invalid parameters are reported, never silently replaced with
    /// working defaults.
    pub fn validate(&self) -> Result<()> {
        match *self {
            LimiterConfig::SlidingWindow {
                max_requests,
                window_secs,
            } => {
                if max_requests == 0 {
                    return Err(FloodgateError::Config(
                        "sliding_window: max_requests must be at least 1".to_string(),
                    ));
                }
                if !window_secs.is_finite() || window_secs <= 0.0 {
                    return Err(FloodgateError::Config(format!(
                        "sliding_window: window_secs must be a positive finite number, got {window_secs}"
                    )));
                }
            }
            LimiterConfig::TokenBucket {
                capacity,
                refill_rate,
            } => {
                if !capacity.is_finite() || capacity <= 0.0 {
                    return Err(FloodgateError::Config(format!(
                        "token_bucket: capacity must be a positive finite number, got {capacity}"
                    )));
                }
                if !refill_rate.is_finite() || refill_rate <= 0.0 {
                    return Err(FloodgateError::Config(format!(
                        "token_bucket: refill_rate must be a positive finite number, got {refill_rate}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Declarations for a set of named limiters, typically loaded from YAML.
///
/// ```yaml
/// limiters:
///   login:
///     algorithm: sliding_window
///     max_requests: 5
///     window_secs: 60.0
///   api:
///     algorithm: token_bucket
///     capacity: 100.0
///     refill_rate: 10.0
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Map of limiter name to its configuration.
    #[serde(default)]
    pub limiters: HashMap<String, LimiterConfig>,
}

impl RegistryConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse limiter config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        assert_eq!(
            "sliding_window".parse::<LimiterKind>().unwrap(),
            LimiterKind::SlidingWindow
        );
        assert_eq!(
            "token_bucket".parse::<LimiterKind>().unwrap(),
            LimiterKind::TokenBucket
        );
        assert_eq!(LimiterKind::SlidingWindow.to_string(), "sliding_window");
        assert_eq!(LimiterKind::TokenBucket.to_string(), "token_bucket");
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        let err = "leaky_bucket".parse::<LimiterKind>().unwrap_err();
        assert!(matches!(err, FloodgateError::Config(_)));
        assert!(err.to_string().contains("leaky_bucket"));
    }

    #[test]
    fn test_validate_accepts_positive_parameters() {
        LimiterConfig::sliding_window(3, Duration::from_secs(60))
            .validate()
            .unwrap();
        LimiterConfig::token_bucket(5.0, 1.0).validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_non_positive_parameters() {
        let cases = [
            LimiterConfig::SlidingWindow {
                max_requests: 0,
                window_secs: 60.0,
            },
            LimiterConfig::SlidingWindow {
                max_requests: 3,
                window_secs: 0.0,
            },
            LimiterConfig::SlidingWindow {
                max_requests: 3,
                window_secs: -1.0,
            },
            LimiterConfig::TokenBucket {
                capacity: 0.0,
                refill_rate: 1.0,
            },
            LimiterConfig::TokenBucket {
                capacity: 5.0,
                refill_rate: -0.5,
            },
            LimiterConfig::TokenBucket {
                capacity: f64::NAN,
                refill_rate: 1.0,
            },
            LimiterConfig::TokenBucket {
                capacity: 5.0,
                refill_rate: f64::INFINITY,
            },
        ];

        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, FloodgateError::Config(_)), "{config:?}");
        }
    }

    #[test]
    fn test_parse_registry_config() {
        let yaml = r#"
limiters:
  login:
    algorithm: sliding_window
    max_requests: 5
    window_secs: 60.0
  api:
    algorithm: token_bucket
    capacity: 100.0
    refill_rate: 10.0
"#;
        let config = RegistryConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limiters.len(), 2);
        assert_eq!(
            config.limiters["login"].kind(),
            LimiterKind::SlidingWindow
        );
        assert_eq!(config.limiters["api"].kind(), LimiterKind::TokenBucket);
    }

    #[test]
    fn test_parse_unknown_algorithm_fails() {
        let yaml = r#"
limiters:
  weird:
    algorithm: leaky_bucket
    capacity: 10.0
"#;
        let err = RegistryConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, FloodgateError::Config(_)));
    }

    #[test]
    fn test_empty_config_parses() {
        let config = RegistryConfig::from_yaml("limiters: {}").unwrap();
        assert!(config.limiters.is_empty());
    }
}
