//! Server clock abstraction
//!
//! All timing decisions in the engine derive from a single trusted clock on
//! the server; client-reported times are never trusted. The [`Clock`] trait
//! makes that clock injectable so the timeout reconciler and the
//! synchronization protocol can be tested deterministically.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use web_time::SystemTime;

/// A timestamp as read from the server clock
pub type Timestamp = SystemTime;

/// The trusted wall clock the engine derives all timing from
pub trait Clock {
    /// Returns the current server time
    fn now(&self) -> Timestamp;
}

/// The real clock, backed by the system time
///
/// Uses `web_time` so the engine behaves identically on native and WASM
/// targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
    }
}

/// A manually advanced clock for deterministic tests
///
/// Clones share the same underlying instant, so a clone handed to an engine
/// observes every [`ManualClock::advance`] made by the test.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<Timestamp>>);

impl ManualClock {
    /// Creates a manual clock starting at the given instant
    pub fn starting_at(start: Timestamp) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    /// Advances the clock by the given duration
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().expect("clock lock poisoned");
        *now += by;
    }
}

impl Default for ManualClock {
    /// Creates a manual clock starting at the current system time
    fn default() -> Self {
        Self::starting_at(SystemTime::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.0.lock().expect("clock lock poisoned")
    }
}
