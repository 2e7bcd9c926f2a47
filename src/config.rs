use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_MASTERY_STREAK;

/// SM-2 and forgetting-curve parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionConfig {
    pub min_ease_factor: f64,
    pub max_ease_factor: f64,
    pub initial_ease_factor: f64,
    /// k in exp(-k * days / interval)
    pub decay_constant: f64,
    /// EMA weight of the newest response time
    pub response_time_alpha: f64,
    pub slow_response_ms: f64,
    /// Slow when last response exceeds this multiple of the average
    pub slow_response_ratio: f64,
    /// Interval shrink applied to slow correct answers
    pub slow_response_penalty: f64,
    pub incorrect_ease_penalty: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            min_ease_factor: 1.3,
            max_ease_factor: 2.5,
            initial_ease_factor: 2.5,
            decay_constant: 0.5,
            response_time_alpha: 0.3,
            slow_response_ms: 3000.0,
            slow_response_ratio: 1.5,
            slow_response_penalty: 0.2,
            incorrect_ease_penalty: 0.2,
        }
    }
}

/// Subscriber settings for binaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// `EnvFilter` directive string
    pub level: String,
    /// Also write daily-rotated files under `dir`
    pub file_logs: bool,
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logs: false,
            dir: "./logs".to_string(),
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: std::env::var("RUST_LOG").unwrap_or(defaults.level),
            file_logs: env_flag("SCHEDULER_FILE_LOGS").unwrap_or(defaults.file_logs),
            dir: std::env::var("SCHEDULER_LOG_DIR").unwrap_or(defaults.dir),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub retention: RetentionConfig,
    pub logging: LogConfig,
    pub prediction_log_capacity: usize,
    pub calibration_bins: usize,
    /// Log (predicted, actual) pairs on every recorded outcome
    pub log_predictions: bool,
    pub mastery_streak: u32,
    /// Fixed seed for the tie-break RNG; random when unset
    pub rng_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retention: RetentionConfig::default(),
            logging: LogConfig::default(),
            prediction_log_capacity: 10_000,
            calibration_bins: 10,
            log_predictions: true,
            mastery_streak: DEFAULT_MASTERY_STREAK,
            rng_seed: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v == "true" || v == "1")
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut retention = RetentionConfig::default();
        if let Some(k) = env_parse::<f64>("SCHEDULER_DECAY_CONSTANT") {
            retention.decay_constant = k;
        }

        let config = Self {
            retention,
            logging: LogConfig::from_env(),
            prediction_log_capacity: env_parse("SCHEDULER_PREDICTION_LOG_CAPACITY")
                .unwrap_or(defaults.prediction_log_capacity),
            calibration_bins: env_parse("SCHEDULER_CALIBRATION_BINS")
                .unwrap_or(defaults.calibration_bins),
            log_predictions: env_flag("SCHEDULER_LOG_PREDICTIONS")
                .unwrap_or(defaults.log_predictions),
            mastery_streak: env_parse("SCHEDULER_MASTERY_STREAK")
                .unwrap_or(defaults.mastery_streak),
            rng_seed: env_parse("SCHEDULER_RNG_SEED"),
        };

        config.validate()
    }

    /// Repair values that would break scheduling invariants
    pub fn validate(mut self) -> Self {
        let defaults = Self::default();
        let r = &mut self.retention;

        if !(r.min_ease_factor.is_finite() && r.max_ease_factor.is_finite())
            || r.min_ease_factor <= 0.0
            || r.min_ease_factor > r.max_ease_factor
        {
            tracing::warn!(
                min = r.min_ease_factor,
                max = r.max_ease_factor,
                "invalid ease factor bounds, using defaults"
            );
            r.min_ease_factor = defaults.retention.min_ease_factor;
            r.max_ease_factor = defaults.retention.max_ease_factor;
        }
        r.initial_ease_factor = if r.initial_ease_factor.is_finite() {
            r.initial_ease_factor.clamp(r.min_ease_factor, r.max_ease_factor)
        } else {
            r.max_ease_factor
        };
        if !r.decay_constant.is_finite() || r.decay_constant <= 0.0 {
            r.decay_constant = defaults.retention.decay_constant;
        }
        if !r.response_time_alpha.is_finite() {
            r.response_time_alpha = defaults.retention.response_time_alpha;
        }
        r.response_time_alpha = r.response_time_alpha.clamp(0.0, 1.0);
        if !r.slow_response_penalty.is_finite() {
            r.slow_response_penalty = defaults.retention.slow_response_penalty;
        }
        r.slow_response_penalty = r.slow_response_penalty.clamp(0.0, 0.9);

        if self.prediction_log_capacity == 0 {
            self.prediction_log_capacity = defaults.prediction_log_capacity;
        }
        if self.calibration_bins == 0 {
            self.calibration_bins = defaults.calibration_bins;
        }
        if self.mastery_streak == 0 {
            self.mastery_streak = defaults.mastery_streak;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_sm2() {
        let config = SchedulerConfig::default();
        assert_eq!(config.retention.min_ease_factor, 1.3);
        assert_eq!(config.retention.max_ease_factor, 2.5);
        assert_eq!(config.prediction_log_capacity, 10_000);
        assert_eq!(config.calibration_bins, 10);
    }

    #[test]
    fn test_validate_repairs_bounds() {
        let mut config = SchedulerConfig::default();
        config.retention.min_ease_factor = 3.0;
        config.retention.max_ease_factor = 1.0;
        config.calibration_bins = 0;
        config.prediction_log_capacity = 0;

        let fixed = config.validate();
        assert_eq!(fixed.retention.min_ease_factor, 1.3);
        assert_eq!(fixed.retention.max_ease_factor, 2.5);
        assert_eq!(fixed.calibration_bins, 10);
        assert_eq!(fixed.prediction_log_capacity, 10_000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"calibrationBins": 20, "retention": {"decayConstant": 0.7}}"#)
                .unwrap();
        assert_eq!(config.calibration_bins, 20);
        assert_eq!(config.retention.decay_constant, 0.7);
        assert_eq!(config.retention.max_ease_factor, 2.5);
        assert!(config.log_predictions);
        assert_eq!(config.logging, LogConfig::default());
    }

    #[test]
    fn test_logging_section_from_json() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"logging": {"fileLogs": true, "dir": "/var/log/danci"}}"#)
                .unwrap();
        assert!(config.logging.file_logs);
        assert_eq!(config.logging.dir, "/var/log/danci");
        assert_eq!(config.logging.level, "info");
    }
}
