use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

/// Paces the probes of one search cycle.
///
/// The cycle ends when `budget` has elapsed since `start`, or as soon as the
/// cancellation channel is disconnected (its sender dropped).
pub struct SearchTicker {
    started_at: Instant,
    deadline: Instant,
    interval: Duration,
    cancel: Receiver<()>,
}

impl SearchTicker {
    pub fn new(budget: Duration, interval: Duration, cancel: Receiver<()>) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: started_at + budget,
            interval,
            cancel,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cancel.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Sleeps until the next probe is due. Returns `false` when the cycle
    /// must end instead.
    pub fn wait_next(&self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let wait = self.interval.min(self.deadline - now);
        match self.cancel.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => !self.is_expired(),
            Err(RecvTimeoutError::Disconnected) => false,
            // Nobody sends on the channel; treat a stray message as a tick.
            Ok(()) => !self.is_expired(),
        }
    }
}
