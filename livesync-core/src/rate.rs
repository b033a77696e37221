//! Playback-rate control
//!
//! Maps the live-vs-target latency error to a discrete playback-speed
//! decision through ordered threshold rules: small errors get a gentle
//! nudge, large errors an aggressive one.

use thiserror::Error;

/// Dead zone around the target within which playback runs at nominal
/// speed, seconds
const DEFAULT_DEAD_ZONE_SECS: f64 = 0.005;

/// One step of a decision ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateRule {
    /// Latency-error bound in seconds; the final rule is unbounded
    pub threshold_secs: f64,
    /// Playback-rate multiplier applied when the rule matches
    pub rate: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum RateConfigError {
    #[error("rule table is empty")]
    Empty,
    #[error("rule thresholds must strictly increase in magnitude")]
    NotMonotonic,
    #[error("final rule threshold must be unbounded")]
    BoundedTail,
    #[error("rates must be positive and finite")]
    InvalidRate,
}

/// Rate-decision configuration: a dead zone plus one ladder per
/// direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RateControlConfig {
    pub dead_zone_secs: f64,
    /// Behind target (positive error), ascending thresholds
    pub catch_up: Vec<RateRule>,
    /// Ahead of target (negative error), descending thresholds
    pub slow_down: Vec<RateRule>,
}

impl Default for RateControlConfig {
    fn default() -> Self {
        Self {
            dead_zone_secs: DEFAULT_DEAD_ZONE_SECS,
            catch_up: vec![
                RateRule { threshold_secs: 0.1, rate: 1.01 },
                RateRule { threshold_secs: 0.4, rate: 1.1 },
                RateRule { threshold_secs: f64::INFINITY, rate: 2.0 },
            ],
            slow_down: vec![
                RateRule { threshold_secs: -0.1, rate: 0.99 },
                RateRule { threshold_secs: -0.4, rate: 0.9 },
                RateRule { threshold_secs: f64::NEG_INFINITY, rate: 0.5 },
            ],
        }
    }
}

impl RateControlConfig {
    /// Check the ladder invariants: non-empty, positive finite rates,
    /// strictly increasing threshold magnitude, unbounded final
    /// threshold. Custom tables should be validated before use so a
    /// decision always matches a rule.
    pub fn validate(&self) -> Result<(), RateConfigError> {
        validate_ladder(&self.catch_up)?;
        validate_ladder(&self.slow_down)
    }
}

fn validate_ladder(rules: &[RateRule]) -> Result<(), RateConfigError> {
    if rules.is_empty() {
        return Err(RateConfigError::Empty);
    }
    if rules.iter().any(|r| !r.rate.is_finite() || r.rate <= 0.0) {
        return Err(RateConfigError::InvalidRate);
    }
    if rules
        .windows(2)
        .any(|pair| pair[1].threshold_secs.abs() <= pair[0].threshold_secs.abs())
    {
        return Err(RateConfigError::NotMonotonic);
    }
    if rules[rules.len() - 1].threshold_secs.is_finite() {
        return Err(RateConfigError::BoundedTail);
    }
    Ok(())
}

/// Decide the playback rate for a live-sync difference in seconds.
///
/// Positive difference means the player lags behind target and must
/// speed up; negative means it runs ahead. Within the dead zone (and for
/// an undecidable difference such as NaN) playback stays nominal.
pub fn decide(live_sync_difference_secs: f64, config: &RateControlConfig) -> f64 {
    let diff = live_sync_difference_secs;
    if diff.abs() < config.dead_zone_secs {
        return 1.0;
    }

    let ladder = if diff > 0.0 { &config.catch_up } else { &config.slow_down };
    for rule in ladder {
        let matches = if diff > 0.0 {
            diff <= rule.threshold_secs
        } else {
            diff >= rule.threshold_secs
        };
        if matches {
            return rule.rate;
        }
    }
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_decisions() {
        let config = RateControlConfig::default();
        assert_eq!(decide(0.05, &config), 1.01);
        assert_eq!(decide(-0.05, &config), 0.99);
        assert_eq!(decide(0.0001, &config), 1.0);
        assert_eq!(decide(5.0, &config), 2.0);
        assert_eq!(decide(-5.0, &config), 0.5);
    }

    #[test]
    fn test_middle_rungs() {
        let config = RateControlConfig::default();
        assert_eq!(decide(0.25, &config), 1.1);
        assert_eq!(decide(-0.25, &config), 0.9);
    }

    #[test]
    fn test_threshold_boundaries_are_inclusive() {
        let config = RateControlConfig::default();
        assert_eq!(decide(0.1, &config), 1.01);
        assert_eq!(decide(0.4, &config), 1.1);
        assert_eq!(decide(-0.1, &config), 0.99);
        assert_eq!(decide(-0.4, &config), 0.9);
    }

    #[test]
    fn test_dead_zone_boundary() {
        let config = RateControlConfig::default();
        // Exactly the dead-zone bound is outside the dead zone
        assert_eq!(decide(0.005, &config), 1.01);
        assert_eq!(decide(-0.005, &config), 0.99);
        assert_eq!(decide(0.0049, &config), 1.0);
    }

    #[test]
    fn test_nan_difference_stays_nominal() {
        let config = RateControlConfig::default();
        assert_eq!(decide(f64::NAN, &config), 1.0);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RateControlConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ladders() {
        let mut config = RateControlConfig::default();
        config.catch_up.clear();
        assert_eq!(config.validate(), Err(RateConfigError::Empty));

        let mut config = RateControlConfig::default();
        config.catch_up = vec![
            RateRule { threshold_secs: 0.4, rate: 1.1 },
            RateRule { threshold_secs: 0.1, rate: 1.01 },
            RateRule { threshold_secs: f64::INFINITY, rate: 2.0 },
        ];
        assert_eq!(config.validate(), Err(RateConfigError::NotMonotonic));

        let mut config = RateControlConfig::default();
        config.slow_down = vec![RateRule { threshold_secs: -0.4, rate: 0.9 }];
        assert_eq!(config.validate(), Err(RateConfigError::BoundedTail));

        let mut config = RateControlConfig::default();
        config.catch_up[0].rate = 0.0;
        assert_eq!(config.validate(), Err(RateConfigError::InvalidRate));
    }
}
