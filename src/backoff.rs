//! Exponential backoff as an explicit state machine.
//!
//! The fetcher asks the machine what to do after each failed attempt instead
//! of nesting retries, which keeps the schedule testable without a network.

use std::time::Duration;

/// Retry schedule: `base`, `base * 2`, `base * 4`, ... capped at `max_delay`,
/// for at most `max_attempts` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn start(self) -> Backoff {
        Backoff {
            policy: self,
            attempt: 0,
            delay: self.base_delay.min(self.max_delay),
            state: BackoffState::Ready,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffState {
    /// An attempt may be made.
    Ready,
    /// Terminal: the last attempt succeeded.
    Succeeded,
    /// Terminal: attempts are used up or the failure was not retryable.
    GaveUp,
}

/// What the caller should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Wait this long, then try again.
    Retry(Duration),
    /// Stop and report the failure.
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
    delay: Duration,
    state: BackoffState,
}

impl Backoff {
    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn state(&self) -> BackoffState {
        self.state
    }

    /// Record the start of an attempt.
    pub fn begin_attempt(&mut self) {
        debug_assert_eq!(self.state, BackoffState::Ready);
        self.attempt += 1;
    }

    pub fn succeed(&mut self) {
        self.state = BackoffState::Succeeded;
    }

    /// Record a failed attempt. `retryable` is false for errors no amount of
    /// waiting will fix; `server_hint` is a Retry-After style minimum wait.
    pub fn fail(&mut self, retryable: bool, server_hint: Option<Duration>) -> Step {
        if !retryable || self.attempt >= self.policy.max_attempts {
            self.state = BackoffState::GaveUp;
            return Step::GiveUp;
        }

        let wait = server_hint.map_or(self.delay, |hint| hint.max(self.delay));
        self.delay = self.delay.saturating_mul(2).min(self.policy.max_delay);
        Step::Retry(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        }
    }

    #[test]
    fn delays_double_then_cap() {
        let mut backoff = policy(10).start();
        let mut waits = Vec::new();
        for _ in 0..6 {
            backoff.begin_attempt();
            match backoff.fail(true, None) {
                Step::Retry(d) => waits.push(d.as_millis()),
                Step::GiveUp => panic!("gave up early"),
            }
        }
        assert_eq!(waits, [100, 200, 400, 800, 1_000, 1_000]);
        assert_eq!(backoff.state(), BackoffState::Ready);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut backoff = policy(3).start();
        let mut steps = Vec::new();
        for _ in 0..3 {
            backoff.begin_attempt();
            steps.push(backoff.fail(true, None));
        }
        assert_eq!(
            steps,
            [
                Step::Retry(Duration::from_millis(100)),
                Step::Retry(Duration::from_millis(200)),
                Step::GiveUp,
            ]
        );
        assert_eq!(backoff.attempts(), 3);
        assert_eq!(backoff.state(), BackoffState::GaveUp);
    }

    #[test]
    fn fatal_errors_stop_immediately() {
        let mut backoff = policy(5).start();
        backoff.begin_attempt();
        assert_eq!(backoff.fail(false, None), Step::GiveUp);
        assert_eq!(backoff.attempts(), 1);
    }

    #[test]
    fn server_hint_extends_the_wait() {
        let mut backoff = policy(5).start();
        backoff.begin_attempt();
        assert_eq!(
            backoff.fail(true, Some(Duration::from_secs(30))),
            Step::Retry(Duration::from_secs(30))
        );
        // The hint does not disturb the doubling schedule.
        backoff.begin_attempt();
        assert_eq!(backoff.fail(true, None), Step::Retry(Duration::from_millis(200)));
    }

    #[test]
    fn success_is_terminal() {
        let mut backoff = policy(5).start();
        backoff.begin_attempt();
        backoff.succeed();
        assert_eq!(backoff.state(), BackoffState::Succeeded);
    }
}
