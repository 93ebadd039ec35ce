// Rate-limit observation for Mastodon API calls.
//
// The instance advertises its quota in X-RateLimit-* headers, but at least
// some instances lie about the reset window: the header says five minutes,
// the counter actually resets every fifteen. So instead of trusting the
// advertised reset time, we watch for the remaining-call counter to jump
// upward (a reset boundary crossing) and keep a rolling history of the
// observed inter-reset intervals.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use tracing::{debug, warn};

/// Reset period assumed until enough boundaries have been observed, seconds.
pub const DEFAULT_RESET_PERIOD: f64 = 300.0;

/// Remaining-call count assumed before the first response is seen.
const DEFAULT_REMAINING: u32 = 300;

/// How many observed inter-reset intervals to keep.
const PERIOD_HISTORY_CAP: usize = 10;

/// Remaining-call count below which every response logs a warning.
const LOW_QUOTA_THRESHOLD: u32 = 150;

/// Quota metadata parsed from one API response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitInfo {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitInfo {
    /// Parse the X-RateLimit-* headers from a response. Missing or
    /// malformed headers simply leave the field unset.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        }

        let reset_at = headers
            .get("X-RateLimit-Reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Self {
            limit: header_u32(headers, "X-RateLimit-Limit"),
            remaining: header_u32(headers, "X-RateLimit-Remaining"),
            reset_at,
        }
    }
}

/// Tracks quota state across responses and estimates the true reset period.
///
/// The rolling history is updated only when `remaining` increases relative
/// to the prior observation. The first two recorded intervals are presumed
/// unreliable (the window was already partly elapsed at startup) and are
/// both overwritten once a third sample exists.
pub struct RateObserver {
    remaining: u32,
    window_start: DateTime<Utc>,
    next_reset_estimate: Option<DateTime<Utc>>,
    observed_periods: VecDeque<f64>,
}

impl RateObserver {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            remaining: DEFAULT_REMAINING,
            window_start: now,
            next_reset_estimate: None,
            observed_periods: VecDeque::new(),
        }
    }

    /// Like `new`, but seeds the history with a previously persisted reset
    /// period so a restarted bot doesn't re-learn the window from scratch.
    /// Three copies, so the mean is live immediately.
    pub fn with_seed_period(now: DateTime<Utc>, period_secs: u64) -> Self {
        let mut observer = Self::new(now);
        if period_secs > 0 {
            observer
                .observed_periods
                .extend([period_secs as f64, period_secs as f64, period_secs as f64]);
        }
        observer
    }

    /// Fold one response's quota metadata into the state.
    pub fn ingest(&mut self, info: &RateLimitInfo, now: DateTime<Utc>) {
        if let Some(remaining) = info.remaining {
            if remaining > self.remaining {
                // Reset boundary crossed: record how long the last window ran.
                let elapsed = seconds_between(self.window_start, now);
                self.observed_periods.push_back(elapsed);
                while self.observed_periods.len() > PERIOD_HISTORY_CAP {
                    self.observed_periods.pop_front();
                }
                if self.observed_periods.len() == 3 {
                    let third = self.observed_periods[2];
                    self.observed_periods[0] = third;
                    self.observed_periods[1] = third;
                }
                self.window_start = now;
            }
            self.remaining = remaining;
        }

        if let Some(reset_at) = info.reset_at {
            self.next_reset_estimate = Some(reset_at);
        }

        if let Some(remaining) = info.remaining {
            if remaining < LOW_QUOTA_THRESHOLD {
                warn!(
                    limit = ?info.limit,
                    remaining,
                    advertised_reset = ?self.next_reset_estimate,
                    "rate limit running low"
                );
            } else {
                debug!(
                    limit = ?info.limit,
                    remaining,
                    est_reset_secs = self.estimated_secs_to_reset(now),
                    "rate limit observed"
                );
            }
        }
    }

    /// Last known remaining-call count for the current window.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Mean observed reset period in seconds. Falls back to the default
    /// until more than two boundaries have been seen.
    pub fn observed_period(&self) -> f64 {
        if self.observed_periods.len() > 2 {
            self.observed_periods.iter().sum::<f64>() / self.observed_periods.len() as f64
        } else {
            DEFAULT_RESET_PERIOD
        }
    }

    /// Seconds until the next rate-limit reset, based on observation:
    /// time elapsed in the current window plus the mean observed period.
    pub fn estimated_secs_to_reset(&self, now: DateTime<Utc>) -> u64 {
        let estimate = seconds_between(self.window_start, now) + self.observed_period();
        estimate.max(0.0) as u64
    }

    /// The reset time the instance last advertised, for log context only.
    pub fn next_reset_estimate(&self) -> Option<DateTime<Utc>> {
        self.next_reset_estimate
    }
}

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn info(remaining: u32) -> RateLimitInfo {
        RateLimitInfo {
            limit: Some(300),
            remaining: Some(remaining),
            reset_at: None,
        }
    }

    #[test]
    fn defaults_before_any_observation() {
        let observer = RateObserver::new(at(0));
        assert_eq!(observer.remaining(), 300);
        assert_eq!(observer.observed_period(), DEFAULT_RESET_PERIOD);
    }

    #[test]
    fn remaining_tracks_latest_header() {
        let mut observer = RateObserver::new(at(0));
        observer.ingest(&info(250), at(1));
        observer.ingest(&info(249), at(2));
        assert_eq!(observer.remaining(), 249);
    }

    #[test]
    fn one_or_two_samples_keep_the_default_period() {
        let mut observer = RateObserver::new(at(0));
        observer.ingest(&info(10), at(1));
        observer.ingest(&info(300), at(900)); // first boundary
        assert_eq!(observer.observed_period(), DEFAULT_RESET_PERIOD);
        observer.ingest(&info(10), at(901));
        observer.ingest(&info(300), at(1800)); // second boundary
        assert_eq!(observer.observed_period(), DEFAULT_RESET_PERIOD);
    }

    #[test]
    fn first_two_samples_overwritten_by_the_third() {
        let mut observer = RateObserver::new(at(0));
        // Boundaries at 100s, 400s, 1300s: intervals 100, 300, 900.
        observer.ingest(&info(10), at(1));
        observer.ingest(&info(300), at(100));
        observer.ingest(&info(10), at(101));
        observer.ingest(&info(300), at(400));
        observer.ingest(&info(10), at(401));
        observer.ingest(&info(300), at(1300));
        // The unreliable 100 and 300 are replaced by 900.
        assert_eq!(observer.observed_period(), 900.0);
    }

    #[test]
    fn converges_to_the_mean_of_recent_intervals() {
        let mut observer = RateObserver::new(at(0));
        // Fifteen boundaries, 900s apart. Only the last ten are kept
        // (and the early overwrite washes out anyway at a constant cadence).
        let mut t = 0;
        for _ in 0..15 {
            observer.ingest(&info(10), at(t + 1));
            t += 900;
            observer.ingest(&info(300), at(t));
        }
        assert_eq!(observer.observed_period(), 900.0);
        assert_eq!(observer.observed_periods.len(), PERIOD_HISTORY_CAP);
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let mut observer = RateObserver::new(at(0));
        // Ten intervals of 600s, then two of 1200s: the mean should move
        // toward 1200 as the oldest 600s fall out.
        let mut t = 0;
        for _ in 0..10 {
            observer.ingest(&info(10), at(t + 1));
            t += 600;
            observer.ingest(&info(300), at(t));
        }
        assert_eq!(observer.observed_period(), 600.0);
        for _ in 0..2 {
            observer.ingest(&info(10), at(t + 1));
            t += 1200;
            observer.ingest(&info(300), at(t));
        }
        // 8 * 600 + 2 * 1200 over 10 samples.
        assert_eq!(observer.observed_period(), 720.0);
    }

    #[test]
    fn seed_period_makes_the_mean_live_immediately() {
        let observer = RateObserver::with_seed_period(at(0), 900);
        assert_eq!(observer.observed_period(), 900.0);
    }

    #[test]
    fn zero_seed_period_is_ignored() {
        let observer = RateObserver::with_seed_period(at(0), 0);
        assert_eq!(observer.observed_period(), DEFAULT_RESET_PERIOD);
    }

    #[test]
    fn estimated_reset_is_elapsed_plus_mean_period() {
        let mut observer = RateObserver::with_seed_period(at(0), 900);
        observer.ingest(&info(300), at(0)); // no increase, window_start stays
        assert_eq!(observer.estimated_secs_to_reset(at(60)), 960);
    }

    #[test]
    fn decreasing_remaining_never_records_a_period() {
        let mut observer = RateObserver::new(at(0));
        for (i, r) in [300u32, 250, 200, 150, 100].iter().enumerate() {
            observer.ingest(&info(*r), at(i as i64 * 10));
        }
        assert!(observer.observed_periods.is_empty());
    }

    #[test]
    fn parses_rate_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Limit", "300".parse().unwrap());
        headers.insert("X-RateLimit-Remaining", "287".parse().unwrap());
        headers.insert(
            "X-RateLimit-Reset",
            "2026-08-30T12:00:00+00:00".parse().unwrap(),
        );
        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.limit, Some(300));
        assert_eq!(info.remaining, Some(287));
        assert_eq!(
            info.reset_at,
            Some(Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn malformed_headers_leave_fields_unset() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", "plenty".parse().unwrap());
        headers.insert("X-RateLimit-Reset", "soon".parse().unwrap());
        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.remaining, None);
        assert_eq!(info.reset_at, None);
        assert_eq!(info.limit, None);
    }
}
