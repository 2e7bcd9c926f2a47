//! # danci-scheduler - adaptive review scheduling
//!
//! Decides which vocabulary item a learner should see next and checks
//! whether the engine's own recall predictions can be trusted:
//!
//! - **RetentionModel** - SM-2 ease/interval state machine plus an
//!   exponential forgetting curve
//! - **Priority strategies** - per-mode ordering of candidates with a
//!   seeded random tie-break
//! - **Limit ramp** - effective per-session caps that relax as the session
//!   progresses
//! - **CalibrationMonitor** - ECE, MAE and Brier score over a bounded
//!   prediction log
//!
//! ## Modules
//!
//! - [`retention`] - SM-2 transitions, retention estimate, due list, consolidation
//! - [`strategy`] - `PriorityStrategy` and the per-mode implementations
//! - [`learning_utils`] - forgetting risk, streak intervals, effective limits
//! - [`progress`] - persisted per-item progress and the derived question view
//! - [`scheduler`] - composition of all of the above for one learning mode
//! - [`calibration`] - calibration metrics and the prediction log
//! - [`store`] - async key-value persistence boundary
//!
//! ## Example
//!
//! ```rust
//! use danci_scheduler::calibration::{analyze_calibration, Prediction, QualityBand};
//! use danci_scheduler::learning_utils::calculate_effective_limit;
//!
//! // early in a session only 75% of the nominal cap is allowed
//! assert_eq!(calculate_effective_limit(30, 0), 23);
//! assert_eq!(calculate_effective_limit(30, 23), 30);
//!
//! let predictions = vec![Prediction::new(1.0, true), Prediction::new(0.0, false)];
//! let report = analyze_calibration(&predictions, 10);
//! assert_eq!(report.ece, 0.0);
//! assert_eq!(report.ece_quality, QualityBand::Excellent);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod calibration;
pub mod clock;
pub mod config;
pub mod learning_utils;
pub mod logging;
pub mod progress;
pub mod retention;
pub mod sanitize;
pub mod scheduler;
pub mod store;
pub mod strategy;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use calibration::{
    CalibrationMonitor, CalibrationReport, ConfidenceBias, Prediction, PredictionLog, QualityBand,
};
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use config::{LogConfig, RetentionConfig, SchedulerConfig};
pub use progress::{ModeProgress, ProgressRepository, QuestionStatus, WordProgress};
pub use retention::{ConsolidationReport, RetentionModel, RetentionStatus};
pub use scheduler::Scheduler;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, StoreResult};
pub use strategy::{strategy_for, GrammarStrategy, MemorizationStrategy, PriorityContext, PriorityStrategy};
