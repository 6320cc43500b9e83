//! Worker status introspection.
//!
//! Each background worker carries an explicit, cloneable status handle
//! instead of module-level globals, so tests (and deployments running
//! multiple worker instances) can query a specific worker's state.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct StatusInner {
    running: bool,
    last_tick_at: Option<DateTime<Utc>>,
    ticks_completed: u64,
}

/// A point-in-time view of a worker's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStatusSnapshot {
    pub running: bool,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub ticks_completed: u64,
}

/// Cloneable handle to a worker's status. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    inner: Arc<Mutex<StatusInner>>,
}

impl WorkerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, running: bool) {
        self.inner.lock().expect("status lock poisoned").running = running;
    }

    pub fn record_tick(&self) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.last_tick_at = Some(Utc::now());
        inner.ticks_completed += 1;
    }

    pub fn snapshot(&self) -> WorkerStatusSnapshot {
        let inner = self.inner.lock().expect("status lock poisoned");
        WorkerStatusSnapshot {
            running: inner.running,
            last_tick_at: inner.last_tick_at,
            ticks_completed: inner.ticks_completed,
        }
    }
}
