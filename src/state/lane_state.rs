use crate::config::CrawlerConfig;
use std::time::{Duration, Instant};

/// Tracks the pacing state of one store lane during crawling
///
/// Each store owns exactly one session context, so all requests for a store
/// are serialized through one lane. This structure enforces the minimum
/// inter-request delay and adapts it when the store starts blocking.
#[derive(Debug, Clone)]
pub struct LaneState {
    /// Number of requests issued on this lane in the current run
    pub request_count: u32,

    /// Timestamp of the last request on this lane
    pub last_request_time: Option<Instant>,

    /// Whether this lane has seen a Blocked response; doubles the pacing delay
    pub throttled: bool,
}

impl LaneState {
    /// Creates a new LaneState with default values
    pub fn new() -> Self {
        Self {
            request_count: 0,
            last_request_time: None,
            throttled: false,
        }
    }

    /// The effective minimum delay between requests on this lane
    ///
    /// The configured delay, doubled once the lane has been throttled.
    pub fn effective_delay(&self, config: &CrawlerConfig) -> Duration {
        let base = Duration::from_millis(config.min_request_delay_ms);
        if self.throttled {
            base * 2
        } else {
            base
        }
    }

    /// Checks if a request can be issued on this lane right now
    pub fn can_request(&self, config: &CrawlerConfig, now: Instant) -> bool {
        match self.last_request_time {
            Some(last) => now.duration_since(last) >= self.effective_delay(config),
            None => true,
        }
    }

    /// Calculates the time until the next request can be issued
    ///
    /// Returns None if a request can be made now, or the duration to wait.
    pub fn time_until_next_request(
        &self,
        config: &CrawlerConfig,
        now: Instant,
    ) -> Option<Duration> {
        if let Some(last) = self.last_request_time {
            let min_delay = self.effective_delay(config);
            let elapsed = now.duration_since(last);
            if elapsed < min_delay {
                return Some(min_delay - elapsed);
            }
        }
        None
    }

    /// Records that a request was issued on this lane
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Marks this lane as throttled after a Blocked response
    pub fn mark_throttled(&mut self) {
        self.throttled = true;
    }
}

impl Default for LaneState {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff delay before retrying a failed unit
///
/// `base_ms * 2^retry`, with the exponent capped so the delay never exceeds
/// 64x the base.
pub fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let exponent = retry.min(6);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> CrawlerConfig {
        CrawlerConfig {
            max_concurrent_stores: 4,
            min_request_delay_ms: 1000,
            max_retries: 3,
            retry_backoff_ms: 2000,
            fetch_timeout_ms: 45_000,
            progress_interval: 25,
        }
    }

    #[test]
    fn test_new_lane_state() {
        let state = LaneState::new();
        assert_eq!(state.request_count, 0);
        assert!(state.last_request_time.is_none());
        assert!(!state.throttled);
    }

    #[test]
    fn test_can_request_initially() {
        let state = LaneState::new();
        let config = create_test_config();
        assert!(state.can_request(&config, Instant::now()));
    }

    #[test]
    fn test_cannot_request_too_soon() {
        let mut state = LaneState::new();
        let now = Instant::now();
        state.record_request(now);

        let config = create_test_config();

        assert!(!state.can_request(&config, now));

        let soon = now + Duration::from_millis(500);
        assert!(!state.can_request(&config, soon));
    }

    #[test]
    fn test_can_request_after_delay() {
        let mut state = LaneState::new();
        let now = Instant::now();
        state.record_request(now);

        let config = create_test_config();

        let later = now + Duration::from_millis(1100);
        assert!(state.can_request(&config, later));
    }

    #[test]
    fn test_throttled_doubles_delay() {
        let mut state = LaneState::new();
        let now = Instant::now();
        state.record_request(now);
        state.mark_throttled();

        let config = create_test_config();

        // 1100ms would satisfy the base delay, but not the doubled one
        let later = now + Duration::from_millis(1100);
        assert!(!state.can_request(&config, later));

        let much_later = now + Duration::from_millis(2100);
        assert!(state.can_request(&config, much_later));
    }

    #[test]
    fn test_time_until_next_request() {
        let mut state = LaneState::new();
        let config = create_test_config();
        let now = Instant::now();

        assert!(state.time_until_next_request(&config, now).is_none());

        state.record_request(now);
        assert_eq!(
            state.time_until_next_request(&config, now),
            Some(Duration::from_millis(1000))
        );

        let soon = now + Duration::from_millis(600);
        assert_eq!(
            state.time_until_next_request(&config, soon),
            Some(Duration::from_millis(400))
        );

        let later = now + Duration::from_millis(1100);
        assert!(state.time_until_next_request(&config, later).is_none());
    }

    #[test]
    fn test_record_request() {
        let mut state = LaneState::new();
        let now = Instant::now();

        state.record_request(now);
        assert_eq!(state.request_count, 1);
        assert_eq!(state.last_request_time, Some(now));

        state.record_request(now);
        assert_eq!(state.request_count, 2);
    }

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(2000, 0), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2000, 1), Duration::from_millis(4000));
        assert_eq!(backoff_delay(2000, 2), Duration::from_millis(8000));
        assert_eq!(backoff_delay(2000, 3), Duration::from_millis(16000));
    }

    #[test]
    fn test_backoff_delay_capped() {
        assert_eq!(backoff_delay(1000, 6), Duration::from_millis(64_000));
        assert_eq!(backoff_delay(1000, 30), Duration::from_millis(64_000));
    }
}
