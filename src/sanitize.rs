//! Data Sanitization
//!
//! Repairs numbers that arrive from persisted state or callers:
//! - NaN / Inf replaced by safe defaults
//! - out-of-range values clamped back into their invariants

use crate::config::RetentionConfig;
use crate::retention::{MAX_FORGETTING_INDEX, MIN_FORGETTING_INDEX};
use crate::retention::RetentionStatus;

/// Clamp a probability into [0, 1]; `None` for NaN / Inf
pub fn clamp_probability(p: f64) -> Option<f64> {
    if p.is_finite() {
        Some(p.clamp(0.0, 1.0))
    } else {
        None
    }
}

/// Finite and non-negative, otherwise `fallback`
pub fn non_negative_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}

/// Bring a retention status back inside its invariants.
/// Returns `true` when anything was changed.
pub fn sanitize_retention_status(status: &mut RetentionStatus, config: &RetentionConfig) -> bool {
    let mut repaired = false;

    let ef = status.sm2.ease_factor;
    let fixed_ef = if ef.is_finite() {
        ef.clamp(config.min_ease_factor, config.max_ease_factor)
    } else {
        config.initial_ease_factor
    };
    if fixed_ef != ef {
        status.sm2.ease_factor = fixed_ef;
        repaired = true;
    }

    if status.sm2.interval == 0 {
        status.sm2.interval = 1;
        repaired = true;
    }

    let rate = status.retention_rate;
    let fixed_rate = if rate.is_finite() && rate > 0.0 {
        rate.min(1.0)
    } else {
        1.0
    };
    if fixed_rate != rate {
        status.retention_rate = fixed_rate;
        repaired = true;
    }

    let index = status.forgetting_index;
    let fixed_index = if index.is_finite() {
        index.clamp(MIN_FORGETTING_INDEX, MAX_FORGETTING_INDEX)
    } else {
        1.0
    };
    if fixed_index != index {
        status.forgetting_index = fixed_index;
        repaired = true;
    }

    for value in [
        &mut status.average_response_time,
        &mut status.last_response_time,
    ] {
        let fixed = non_negative_or(*value, 0.0);
        if fixed != *value {
            *value = fixed;
            repaired = true;
        }
    }

    if status.total_correct > status.total_reviews {
        status.total_correct = status.total_reviews;
        repaired = true;
    }

    if status.consecutive_correct > 0 && status.consecutive_wrong > 0 {
        status.consecutive_correct = 0;
        repaired = true;
    }

    if status.next_review_date < status.last_review_date {
        status.next_review_date = status.last_review_date;
        repaired = true;
    }

    repaired
}
