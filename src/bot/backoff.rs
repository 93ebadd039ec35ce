// Connection-failure backoff: an explicit state machine driven by a pure
// delay function, so it can be tested without real time passing.
//
// Only connectivity errors feed this machine. A protocol error proves the
// server is reachable, so it resets the streak just like a success.

use std::time::Duration;

/// Consecutive connection failures tolerated before giving up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 15;

/// Where the poll loop stands with respect to connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Last operation succeeded; no delay pending.
    Healthy,
    /// `n` consecutive connection failures so far.
    Failing(u32),
    /// The failure ceiling was exceeded. The only unrecoverable state.
    Fatal,
}

impl Backoff {
    /// A successful operation resets the streak.
    pub fn on_success(self) -> Backoff {
        match self {
            Backoff::Fatal => Backoff::Fatal,
            _ => Backoff::Healthy,
        }
    }

    /// Another consecutive connection failure.
    pub fn on_failure(self) -> Backoff {
        let failures = match self {
            Backoff::Healthy => 1,
            Backoff::Failing(n) => n + 1,
            Backoff::Fatal => return Backoff::Fatal,
        };
        if failures > MAX_CONSECUTIVE_FAILURES {
            Backoff::Fatal
        } else {
            Backoff::Failing(failures)
        }
    }

    pub fn failures(&self) -> u32 {
        match self {
            Backoff::Healthy => 0,
            Backoff::Failing(n) => *n,
            Backoff::Fatal => MAX_CONSECUTIVE_FAILURES + 1,
        }
    }
}

/// Delay before retrying after the `n`th consecutive failure:
/// `min(cap, poll_period * 2^n)`.
pub fn delay(failures: u32, poll_period: Duration, cap: Duration) -> Duration {
    let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
    poll_period.saturating_mul(factor).min(cap)
}
