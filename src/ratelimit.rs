use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited { retry_after: Duration },
}

#[cfg(test)]
impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    pub fn retry_after_secs(&self) -> f64 {
        match self {
            Admission::Allowed => 0.0,
            Admission::Limited { retry_after } => retry_after.as_secs_f64(),
        }
    }
}

/// Global sliding-window limiter for outbound rich messages.
///
/// Shared by every user and command; purge, check and record happen under
/// one lock so concurrent handlers cannot overshoot `max_count`.
pub struct RateLimiter {
    window: Duration,
    max_count: u32,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_count: u32, window_secs: u64) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            max_count,
            timestamps: Mutex::new(VecDeque::with_capacity(max_count as usize + 1)),
        }
    }

    pub fn admit(&self) -> Admission {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&self, now: Instant) -> Admission {
        let mut timestamps = self.timestamps.lock();

        // Remove timestamps that have left the window
        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_count as usize {
            let oldest = timestamps.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(oldest));
            return Admission::Limited { retry_after };
        }

        timestamps.push_back(now);
        Admission::Allowed
    }

    #[cfg(test)]
    pub fn remaining(&self) -> u32 {
        self.max_count.saturating_sub(self.timestamps.lock().len() as u32)
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifth_rapid_call_is_limited() {
        let limiter = RateLimiter::new(4, 35);
        let start = Instant::now();

        let results: Vec<Admission> = (0..5)
            .map(|i| limiter.admit_at(start + Duration::from_millis(200 * i)))
            .collect();

        let allowed: Vec<bool> = results.iter().map(Admission::is_allowed).collect();
        assert_eq!(allowed, vec![true, true, true, true, false]);

        // 35s window minus the 0.8s elapsed since the first admission
        let retry = results[4].retry_after_secs();
        assert!((retry - 34.2).abs() < 1e-6, "retry was {}", retry);
    }

    #[test]
    fn test_retry_after_is_bounded_by_window() {
        let limiter = RateLimiter::new(4, 35);
        let start = Instant::now();
        for _ in 0..4 {
            assert!(limiter.admit_at(start).is_allowed());
        }
        let retry = limiter.admit_at(start).retry_after_secs();
        assert!(retry > 0.0 && retry <= 35.0);
    }

    #[test]
    fn test_slot_frees_when_oldest_leaves_window() {
        let limiter = RateLimiter::new(2, 10);
        let start = Instant::now();
        assert!(limiter.admit_at(start).is_allowed());
        assert!(limiter.admit_at(start + Duration::from_secs(4)).is_allowed());
        assert!(!limiter.admit_at(start + Duration::from_secs(9)).is_allowed());
        assert!(limiter.admit_at(start + Duration::from_secs(10)).is_allowed());
        assert!(!limiter.admit_at(start + Duration::from_secs(11)).is_allowed());
        assert!(limiter.admit_at(start + Duration::from_secs(14)).is_allowed());
    }

    #[test]
    fn test_limited_calls_are_not_recorded() {
        let limiter = RateLimiter::new(1, 10);
        let start = Instant::now();
        assert!(limiter.admit_at(start).is_allowed());
        for s in 1..10 {
            assert!(!limiter.admit_at(start + Duration::from_secs(s)).is_allowed());
        }
        assert!(limiter.admit_at(start + Duration::from_secs(10)).is_allowed());
    }

    #[test]
    fn test_no_window_ever_exceeds_max() {
        let limiter = RateLimiter::new(4, 35);
        let start = Instant::now();
        let mut admitted = Vec::new();

        // Irregular arrival pattern over ~5 minutes
        let mut offset_ms: u64 = 0;
        for i in 0..400u64 {
            offset_ms += (i * 7919) % 2300;
            let at = start + Duration::from_millis(offset_ms);
            if limiter.admit_at(at).is_allowed() {
                admitted.push(offset_ms);
            }
        }

        assert!(!admitted.is_empty());
        for (i, &t) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|&&later| later < t + 35_000)
                .count();
            assert!(in_window <= 4, "window starting at {}ms held {}", t, in_window);
        }
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = RateLimiter::new(3, 35);
        assert_eq!(limiter.remaining(), 3);
        limiter.admit();
        assert_eq!(limiter.remaining(), 2);
    }

    #[test]
    fn test_concurrent_admissions_respect_window() {
        let limiter = std::sync::Arc::new(RateLimiter::new(4, 35));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.admit().is_allowed())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 4);
    }
}
