//! SM-2 step functions
//!
//! - EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), clamped
//! - interval: 1, 6, then round(interval * EF)
//! - lapse: repetition 0, interval 1, EF - penalty

use serde::{Deserialize, Serialize};

use crate::config::RetentionConfig;
use crate::types::MAX_INTERVAL_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sm2State {
    /// Days until the next review
    pub interval: u32,
    /// Successful reviews since the last lapse
    pub repetition: u32,
    pub ease_factor: f64,
}

impl Sm2State {
    pub fn new(config: &RetentionConfig) -> Self {
        Self {
            interval: 1,
            repetition: 0,
            ease_factor: config.initial_ease_factor,
        }
    }
}

/// Confidence 1-5 maps one-to-one onto SM-2 quality, clamped to 0-5
pub fn quality_from_confidence(confidence: u8) -> f64 {
    confidence.min(5) as f64
}

pub fn next_ease_factor(ease_factor: f64, quality: f64, config: &RetentionConfig) -> f64 {
    let q = quality.clamp(0.0, 5.0);
    let delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
    (ease_factor + delta).clamp(config.min_ease_factor, config.max_ease_factor)
}

pub fn apply_correct(state: &mut Sm2State, quality: f64, config: &RetentionConfig) {
    state.repetition += 1;
    state.ease_factor = next_ease_factor(state.ease_factor, quality, config);
    state.interval = match state.repetition {
        1 => 1,
        2 => 6,
        _ => {
            let grown = (state.interval.max(1) as f64 * state.ease_factor).round();
            (grown as u32).clamp(1, MAX_INTERVAL_DAYS)
        }
    };
}

pub fn apply_incorrect(state: &mut Sm2State, config: &RetentionConfig) {
    state.repetition = 0;
    state.interval = 1;
    state.ease_factor = (state.ease_factor - config.incorrect_ease_penalty)
        .clamp(config.min_ease_factor, config.max_ease_factor);
}

/// Shrink an interval for a correct but hesitant answer; never below one day
pub fn apply_slow_penalty(interval: u32, penalty: f64) -> u32 {
    let shrunk = (interval as f64 * (1.0 - penalty)).round();
    (shrunk as u32).max(1)
}
