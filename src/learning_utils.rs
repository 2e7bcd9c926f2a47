//! Lightweight learning heuristics shared by the priority strategies
//!
//! `calculate_optimal_interval` is a simplified streak-based interval model,
//! independent of the SM-2 state kept by the retention model. It is used
//! where only answer counters are available.

use crate::types::{DAY_MS, MAX_INTERVAL_DAYS};

const DEFAULT_EXPECTED_INTERVAL_DAYS: f64 = 1.0;
const TIME_RISK_SCALE: f64 = 100.0;
const ACCURACY_RISK_SCALE: f64 = 50.0;

/// Forgetting risk = time risk + accuracy risk.
///
/// - time risk: `days_since_study / expected_interval * 100`
/// - accuracy risk: `(1 - accuracy/100) * 50`
///
/// Unbounded above; very overdue, very inaccurate items can exceed 300.
pub fn forgetting_risk(days_since_study: f64, expected_interval: Option<f64>, accuracy: f64) -> f64 {
    let expected = expected_interval
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(DEFAULT_EXPECTED_INTERVAL_DAYS);
    let days = if days_since_study.is_finite() {
        days_since_study.max(0.0)
    } else {
        0.0
    };
    let accuracy = if accuracy.is_finite() {
        accuracy.clamp(0.0, 100.0)
    } else {
        0.0
    };

    let time_risk = days / expected * TIME_RISK_SCALE;
    let accuracy_risk = (1.0 - accuracy / 100.0) * ACCURACY_RISK_SCALE;
    time_risk + accuracy_risk
}

/// Streak -> interval in days: 0, 1, 3, 7, then 7 * EF^(n-3)
pub fn calculate_optimal_interval(streak: u32, easiness_factor: f64) -> u32 {
    let ef = if easiness_factor.is_finite() {
        easiness_factor.max(1.0)
    } else {
        1.0
    };
    match streak {
        0 => 0,
        1 => 1,
        2 => 3,
        3 => 7,
        n => {
            let days = 7.0 * ef.powi((n - 3).min(i32::MAX as u32) as i32);
            if days.is_finite() {
                (days.round() as u64).min(MAX_INTERVAL_DAYS as u64) as u32
            } else {
                MAX_INTERVAL_DAYS
            }
        }
    }
}

/// Session-adaptive cap.
///
/// - `current < 50%` of target: `ceil(target * 0.75)`
/// - `current < 75%` of target: `ceil(target * 0.85)`
/// - otherwise: `target`
///
/// `target == 0` means unlimited and returns 0.
pub fn calculate_effective_limit(target: u32, current: u32) -> u32 {
    if target == 0 {
        return 0;
    }
    let target_u = target as u64;
    let current_u = current as u64;

    if current_u * 2 < target_u {
        ((target_u * 75 + 99) / 100) as u32
    } else if current_u * 4 < target_u * 3 {
        ((target_u * 85 + 99) / 100) as u32
    } else {
        target
    }
}

/// `true` when `count` reached the effective cap; an unlimited cap never triggers
pub fn limit_reached(count: u32, target: u32, current: u32) -> bool {
    let effective = calculate_effective_limit(target, current);
    effective > 0 && count >= effective
}

/// Percentage 0-100; 0 when nothing was attempted
pub fn accuracy_percent(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

pub fn days_between(from_ms: i64, to_ms: i64) -> f64 {
    ((to_ms - from_ms) as f64 / DAY_MS as f64).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit_ramp_boundaries() {
        for c in 0..15 {
            assert_eq!(calculate_effective_limit(30, c), 23, "c={c}");
        }
        for c in 15..23 {
            assert_eq!(calculate_effective_limit(30, c), 26, "c={c}");
        }
        for c in 23..40 {
            assert_eq!(calculate_effective_limit(30, c), 30, "c={c}");
        }
    }

    #[test]
    fn test_zero_target_is_unlimited() {
        assert_eq!(calculate_effective_limit(0, 0), 0);
        assert_eq!(calculate_effective_limit(0, 100), 0);
        assert!(!limit_reached(1_000, 0, 10));
    }

    #[test]
    fn test_limit_reached() {
        assert!(!limit_reached(22, 30, 0));
        assert!(limit_reached(23, 30, 0));
        assert!(!limit_reached(25, 30, 20));
        assert!(limit_reached(30, 30, 30));
    }

    #[test]
    fn test_optimal_interval_table() {
        assert_eq!(calculate_optimal_interval(0, 2.5), 0);
        assert_eq!(calculate_optimal_interval(1, 2.5), 1);
        assert_eq!(calculate_optimal_interval(2, 2.5), 3);
        assert_eq!(calculate_optimal_interval(3, 2.5), 7);
        assert_eq!(calculate_optimal_interval(4, 2.5), 18);
        assert_eq!(calculate_optimal_interval(5, 2.5), 44);
        assert_eq!(calculate_optimal_interval(60, 2.5), MAX_INTERVAL_DAYS);
    }

    #[test]
    fn test_optimal_interval_monotone() {
        for ef in [1.0, 1.3, 2.5, 3.0, 0.2] {
            let mut prev = 0;
            for streak in 0..40 {
                let interval = calculate_optimal_interval(streak, ef);
                assert!(interval >= prev, "ef={ef} streak={streak}");
                prev = interval;
            }
        }
    }

    #[test]
    fn test_forgetting_risk() {
        assert_eq!(forgetting_risk(0.0, None, 100.0), 0.0);
        assert_eq!(forgetting_risk(1.0, None, 100.0), 100.0);
        assert_eq!(forgetting_risk(3.0, Some(3.0), 50.0), 125.0);
        assert_eq!(forgetting_risk(2.0, Some(0.0), 0.0), 250.0);
        assert!(forgetting_risk(5.0, Some(1.0), 0.0) > 300.0);
    }

    #[test]
    fn test_accuracy_and_days() {
        assert_eq!(accuracy_percent(0, 0), 0.0);
        assert_eq!(accuracy_percent(3, 4), 75.0);
        assert_eq!(days_between(DAY_MS, 0), 0.0);
        assert_eq!(days_between(0, 3 * DAY_MS), 3.0);
    }
}
