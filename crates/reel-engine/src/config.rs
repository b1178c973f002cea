use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Top-level engine configuration.
///
/// Every section has defaults, so an empty TOML document is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub playback: PlaybackConfig,
    pub gestures: GestureConfig,
    pub monitor: MonitorConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.playback.validate()?;
        self.gestures.validate()?;
        if self.monitor.enabled && self.monitor.interval_ms == 0 {
            return Err(ConfigError::invalid("monitor.interval_ms must be non-zero"));
        }
        Ok(())
    }
}

// --- Playback ---

/// Slot window and retry behaviour of the playback controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Attached handles further than this from the current index are released.
    pub retain_distance: usize,
    /// Neighbours within this distance are attached and kept paused.
    pub preload_distance: usize,
    /// Delay between a transition and the cleanup sweep it schedules.
    pub sweep_grace_ms: u64,
    /// Backoff for ordinary positions.
    pub retry: RetryConfig,
    /// Backoff for positions known to be decoder-constrained.
    pub constrained_retry: RetryConfig,
    pub adaptive: AdaptiveConfig,
    /// Explicit per-position policy overrides.
    pub overrides: Vec<PositionOverride>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retain_distance: 2,
            preload_distance: 1,
            sweep_grace_ms: 300,
            retry: RetryConfig {
                max_retries: 3,
                base_delay_ms: 150,
                max_delay_ms: 2_000,
                jitter: true,
            },
            constrained_retry: RetryConfig {
                max_retries: 3,
                base_delay_ms: 1_000,
                max_delay_ms: 5_000,
                jitter: true,
            },
            adaptive: AdaptiveConfig::default(),
            overrides: Vec::new(),
        }
    }
}

impl PlaybackConfig {
    pub fn sweep_grace(&self) -> Duration {
        Duration::from_millis(self.sweep_grace_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.preload_distance > self.retain_distance {
            return Err(ConfigError::invalid(format!(
                "playback.preload_distance ({}) exceeds retain_distance ({})",
                self.preload_distance, self.retain_distance
            )));
        }
        for entry in &self.overrides {
            let retain = entry.retain_distance.unwrap_or(self.retain_distance);
            let preload = entry.preload_distance.unwrap_or(self.preload_distance);
            if preload > retain {
                return Err(ConfigError::invalid(format!(
                    "override for position {}: preload_distance ({preload}) exceeds retain_distance ({retain})",
                    entry.index
                )));
            }
        }
        Ok(())
    }

    /// Resolve the effective policy for a feed position.
    ///
    /// `adaptively_constrained` is set by the controller once a position has
    /// accumulated enough play rejections in this session.
    pub fn policy_for(&self, index: usize, adaptively_constrained: bool) -> SlotPolicy {
        let mut policy = SlotPolicy {
            retain_distance: self.retain_distance,
            preload_distance: self.preload_distance,
            isolate: false,
            constrained: false,
        };

        if let Some(entry) = self.overrides.iter().find(|o| o.index == index) {
            if let Some(retain) = entry.retain_distance {
                policy.retain_distance = retain;
            }
            if let Some(preload) = entry.preload_distance {
                policy.preload_distance = preload;
            }
            policy.isolate = entry.isolate;
            policy.constrained = entry.constrained;
        }

        if adaptively_constrained {
            policy.isolate = true;
            policy.constrained = true;
        }

        if policy.isolate {
            policy.retain_distance = 0;
            policy.preload_distance = 0;
        }

        policy
    }

    pub fn retry_policy(&self, constrained: bool) -> RetryPolicy {
        if constrained {
            self.constrained_retry.to_policy()
        } else {
            self.retry.to_policy()
        }
    }
}

/// Serializable retry settings, converted to a [`RetryPolicy`] at use sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

/// Promotes positions to constrained handling after repeated play rejections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    /// Failed play attempts at one position, summed over the session, before
    /// it is treated as constrained. The default equals one exhausted retry
    /// chain under the ordinary policy.
    pub failure_threshold: u32,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOverride {
    pub index: usize,
    pub retain_distance: Option<usize>,
    pub preload_distance: Option<usize>,
    /// Evict every other handle before loading this position.
    pub isolate: bool,
    /// Use the constrained retry backoff.
    pub constrained: bool,
}

/// Effective window for one position, after overrides and adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    pub retain_distance: usize,
    pub preload_distance: usize,
    pub isolate: bool,
    pub constrained: bool,
}

// --- Gestures ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Quiet period before a scroll offset is resolved to an index.
    pub scroll_debounce_ms: u64,
    /// Window after a wheel step during which further wheel input is swallowed.
    pub wheel_cooldown_ms: u64,
    /// Wheel deltas at or below this magnitude do not navigate.
    pub wheel_min_delta: f64,
    pub swipe_threshold_px: f64,
    /// Allowed drift between a settled offset and its snapped target.
    pub snap_tolerance_px: f64,
    /// Initial viewport height; hosts update it on resize.
    pub viewport_height: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            scroll_debounce_ms: 100,
            wheel_cooldown_ms: 800,
            wheel_min_delta: 10.0,
            swipe_threshold_px: 50.0,
            snap_tolerance_px: 4.0,
            viewport_height: 800.0,
        }
    }
}

impl GestureConfig {
    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    pub fn wheel_cooldown(&self) -> Duration {
        Duration::from_millis(self.wheel_cooldown_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.viewport_height.is_finite() && self.viewport_height > 0.0) {
            return Err(ConfigError::invalid(
                "gestures.viewport_height must be a positive number",
            ));
        }
        if self.swipe_threshold_px < 0.0 || self.snap_tolerance_px < 0.0 {
            return Err(ConfigError::invalid(
                "gesture thresholds must not be negative",
            ));
        }
        Ok(())
    }
}

// --- Monitor ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 2_000,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.playback.retain_distance, 2);
        assert_eq!(config.playback.preload_distance, 1);
        assert_eq!(config.gestures.wheel_cooldown(), Duration::from_millis(800));
        assert_eq!(config.gestures.scroll_debounce(), Duration::from_millis(100));
        assert_eq!(config.monitor.interval(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.playback.sweep_grace(), Duration::from_millis(300));
        assert!(config.playback.overrides.is_empty());
    }

    #[test]
    fn test_parse_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            [playback]
            retain_distance = 3

            [[playback.overrides]]
            index = 4
            isolate = true

            [[playback.overrides]]
            index = 7
            preload_distance = 0
            constrained = true
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.retain_distance, 3);
        assert_eq!(config.playback.preload_distance, 1);

        let isolated = config.playback.policy_for(4, false);
        assert!(isolated.isolate);
        assert_eq!(isolated.retain_distance, 0);
        assert_eq!(isolated.preload_distance, 0);

        let constrained = config.playback.policy_for(7, false);
        assert!(constrained.constrained);
        assert!(!constrained.isolate);
        assert_eq!(constrained.retain_distance, 3);
        assert_eq!(constrained.preload_distance, 0);

        let plain = config.playback.policy_for(5, false);
        assert_eq!(
            plain,
            SlotPolicy {
                retain_distance: 3,
                preload_distance: 1,
                isolate: false,
                constrained: false,
            }
        );
    }

    #[test]
    fn test_adaptive_flag_isolates_position() {
        let config = PlaybackConfig::default();
        let policy = config.policy_for(9, true);
        assert!(policy.isolate);
        assert!(policy.constrained);
        assert_eq!(policy.retain_distance, 0);
    }

    #[test]
    fn test_constrained_retry_is_slower() {
        let config = PlaybackConfig::default();
        let normal = config.retry_policy(false);
        let constrained = config.retry_policy(true);
        assert!(constrained.base_delay >= Duration::from_secs(1));
        assert!(constrained.base_delay > normal.base_delay);
    }

    #[test]
    fn test_rejects_preload_beyond_retain() {
        let err = EngineConfig::from_toml_str(
            r#"
            [playback]
            retain_distance = 1
            preload_distance = 2
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_invalid_override() {
        let err = EngineConfig::from_toml_str(
            r#"
            [[playback.overrides]]
            index = 2
            retain_distance = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_viewport() {
        let err = EngineConfig::from_toml_str(
            r#"
            [gestures]
            viewport_height = 0.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/definitely/not/here/reel.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
