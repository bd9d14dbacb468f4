//! Settle-window tracking after involuntary holder loss.

use std::time::Duration;
use std::time::Instant;

/// Tracks the lock-delay window during which a slot freed by an invalidated
/// session must not be reclaimed.
///
/// Armed whenever pruning drops a holder whose contender entry vanished
/// without a graceful release: the previous holder may be partitioned rather
/// than dead, and the window keeps a revived holder from colliding with its
/// replacement. While armed, eligibility checks defer exactly like ordinary
/// contention.
#[derive(Debug)]
pub struct LockDelayTracker {
    delay: Duration,
    until: Option<Instant>,
}

impl LockDelayTracker {
    /// Tracker for the configured settle window; zero disables it.
    pub fn new(delay: Duration) -> Self {
        Self { delay, until: None }
    }

    /// Start (or extend) the settle window from now.
    pub fn arm(&mut self) {
        if self.delay.is_zero() {
            return;
        }
        let until = Instant::now() + self.delay;
        if self.until.is_none_or(|current| until > current) {
            self.until = Some(until);
        }
    }

    /// Time left in the window, if it is still open.
    pub fn pending(&mut self) -> Option<Duration> {
        match self.until {
            Some(until) => {
                let now = Instant::now();
                if now < until {
                    Some(until - now)
                } else {
                    self.until = None;
                    None
                }
            }
            None => None,
        }
    }

    /// True while the window is open.
    pub fn is_active(&mut self) -> bool {
        self.pending().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_never_arms() {
        let mut tracker = LockDelayTracker::new(Duration::ZERO);
        tracker.arm();
        assert!(!tracker.is_active());
    }

    #[test]
    fn armed_window_opens_then_closes() {
        let mut tracker = LockDelayTracker::new(Duration::from_millis(50));
        assert!(!tracker.is_active());

        tracker.arm();
        assert!(tracker.is_active());
        assert!(tracker.pending().unwrap() <= Duration::from_millis(50));

        std::thread::sleep(Duration::from_millis(60));
        assert!(!tracker.is_active());
    }

    #[test]
    fn rearming_extends_the_window() {
        let mut tracker = LockDelayTracker::new(Duration::from_millis(50));
        tracker.arm();
        std::thread::sleep(Duration::from_millis(30));
        tracker.arm();
        std::thread::sleep(Duration::from_millis(30));
        // First window would have closed; the re-arm keeps it open.
        assert!(tracker.is_active());
    }
}
