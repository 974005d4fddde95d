//! Deterministic `Clock` for tests.

use chrono::{DateTime, Utc};
use vmforge_core::clock::Clock;

/// A clock pinned to one point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
