use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Enforces a minimum delay between consecutive requests of one worker
///
/// The delay is measured from the end of the previous request. A rate-limit
/// signal doubles the current delay up to a cap; a successful request
/// restores the base delay.
#[derive(Debug, Clone)]
pub struct DelayGate {
    base: Duration,
    current: Duration,
    max: Duration,
    last_request_end: Option<Instant>,
}

impl DelayGate {
    /// Creates a gate with the given base delay and penalty cap
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            current: base,
            max,
            last_request_end: None,
        }
    }

    /// Returns the delay currently enforced
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Switches the base delay (for a stage with different pacing)
    ///
    /// An active penalty larger than the new base is kept.
    pub fn set_base(&mut self, base: Duration) {
        self.base = base;
        self.max = self.max.max(base);
        if self.current < base {
            self.current = base;
        }
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_end?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.current {
            Some(self.current - elapsed)
        } else {
            None
        }
    }

    /// Sleeps until the next request may start
    pub async fn wait(&self) {
        if let Some(remaining) = self.time_until_next_request(Instant::now()) {
            sleep(remaining).await;
        }
    }

    /// Records the end of a request
    pub fn record_request(&mut self) {
        self.last_request_end = Some(Instant::now());
    }

    /// Doubles the delay after a rate-limit signal, up to the cap
    pub fn penalize(&mut self) {
        self.current = (self.current * 2).min(self.max);
    }

    /// Restores the base delay after a successful request
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> DelayGate {
        DelayGate::new(Duration::from_millis(1000), Duration::from_millis(5000))
    }

    #[test]
    fn test_first_request_is_immediate() {
        assert!(gate().time_until_next_request(Instant::now()).is_none());
    }

    #[test]
    fn test_wait_measured_from_request_end() {
        let mut gate = gate();
        gate.record_request();
        let last = gate.last_request_end.unwrap();

        let wait = gate
            .time_until_next_request(last + Duration::from_millis(400))
            .unwrap();
        assert_eq!(wait, Duration::from_millis(600));
        assert!(gate
            .time_until_next_request(last + Duration::from_millis(1000))
            .is_none());
    }

    #[test]
    fn test_penalty_doubles_up_to_cap() {
        let mut gate = gate();
        gate.penalize();
        assert_eq!(gate.current_delay(), Duration::from_millis(2000));
        gate.penalize();
        gate.penalize();
        assert_eq!(gate.current_delay(), Duration::from_millis(5000));

        gate.reset();
        assert_eq!(gate.current_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_set_base_keeps_larger_penalty() {
        let mut gate = gate();
        gate.penalize();
        gate.set_base(Duration::from_millis(500));
        assert_eq!(gate.current_delay(), Duration::from_millis(2000));
        gate.reset();
        assert_eq!(gate.current_delay(), Duration::from_millis(500));

        gate.set_base(Duration::from_millis(1500));
        assert_eq!(gate.current_delay(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_wait_sleeps_remaining_delay() {
        let mut gate = DelayGate::new(Duration::from_millis(50), Duration::from_millis(100));
        gate.record_request();
        let start = Instant::now();
        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
