//! Single-slot retry timer bookkeeping
//!
//! The timer itself is a spawned sleep owned by the dispatcher. This type only
//! tracks which token is live: arming hands out a fresh token and invalidates
//! the previous one, so a firing that raced with a re-arm or a cancel is
//! recognised as stale and dropped.

/// Identifies one arming of the retry timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryToken(u64);

impl RetryToken {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RetryTimer {
    generation: u64,
    armed: Option<RetryToken>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, superseding any outstanding token
    pub fn arm(&mut self) -> RetryToken {
        self.generation += 1;
        let token = RetryToken(self.generation);
        self.armed = Some(token);
        token
    }

    /// Disarm the timer; returns whether a token was outstanding
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Consume a firing; true only for the live token
    pub fn fire(&mut self, token: RetryToken) -> bool {
        if self.armed == Some(token) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn armed(&self) -> Option<RetryToken> {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearm_invalidates_previous_token() {
        let mut timer = RetryTimer::new();
        let first = timer.arm();
        let second = timer.arm();

        assert_ne!(first, second);
        assert!(!timer.fire(first));
        assert!(timer.is_armed());
        assert!(timer.fire(second));
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_fire_after_cancel_is_stale() {
        let mut timer = RetryTimer::new();
        let token = timer.arm();

        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(!timer.fire(token));
    }

    #[test]
    fn test_token_fires_once() {
        let mut timer = RetryTimer::new();
        let token = timer.arm();
        assert!(timer.fire(token));
        assert!(!timer.fire(token));
        assert_eq!(timer.armed(), None);
    }
}
