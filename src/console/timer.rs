//! Resettable idle timer

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep};

/// Fires after a period of silence; every restart pushes the deadline out again
#[derive(Debug)]
pub struct IdleTimer {
    period: Duration,
    fast_path: Duration,
    collapsed: bool,
    sleep: Pin<Box<Sleep>>,
}

impl IdleTimer {
    /// Arm a timer for `period`, collapsing to `fast_path` on request
    pub fn new(period: Duration, fast_path: Duration) -> Self {
        Self {
            period,
            fast_path,
            collapsed: false,
            sleep: Box::pin(sleep(period)),
        }
    }

    /// Restart the full period from now
    pub fn restart(&mut self) {
        let deadline = Instant::now() + self.period;
        self.sleep.as_mut().reset(deadline);
    }

    /// Replace the remaining wait with the fast-path duration
    pub fn collapse(&mut self) {
        self.collapsed = true;
        let deadline = Instant::now() + self.fast_path;
        self.sleep.as_mut().reset(deadline);
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn deadline(&self) -> Instant {
        self.sleep.deadline()
    }

    /// Wait for the current deadline
    pub async fn expired(&mut self) {
        self.sleep.as_mut().await;
    }
}
