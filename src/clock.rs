//! Injectable clock
//!
//! Everything time-dependent reads "now" through [`Clock`] so decay and
//! due-date behaviour can be tested without waiting real time.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::DAY_MS;

pub trait Clock: Send + Sync {
    /// Current time, ms epoch
    fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock; clones share the same time
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    current_ms: Arc<RwLock<i64>>,
}

impl SimulatedClock {
    pub fn starting_at(ms: i64) -> Self {
        Self {
            current_ms: Arc::new(RwLock::new(ms)),
        }
    }

    pub fn set(&self, ms: i64) {
        *self.current_ms.write() = ms;
    }

    pub fn advance_ms(&self, ms: i64) {
        *self.current_ms.write() += ms;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance_ms(days * DAY_MS);
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

impl Clock for SimulatedClock {
    fn now_ms(&self) -> i64 {
        *self.current_ms.read()
    }
}
