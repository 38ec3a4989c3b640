mod id;

pub use id::*;

use tokio::time::{Duration, Instant};

use crossbeam::atomic::AtomicCell;

/// A timestamp that can be refreshed from any task without locking.
#[derive(Debug)]
pub struct Activity(AtomicCell<Instant>);

impl Activity {
    pub fn now() -> Self {
        Self(AtomicCell::new(Instant::now()))
    }

    /// Marks the current instant as the last activity.
    pub fn touch(&self) {
        self.0.store(Instant::now());
    }

    pub fn last(&self) -> Instant {
        self.0.load()
    }

    /// How long it has been since the last activity.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last())
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::now()
    }
}
