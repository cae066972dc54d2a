use chrono::{DateTime, Utc};

/// Wall-clock source. Cooldowns and poll timeouts are anchored to absolute
/// timestamps so they stay correct across restarts.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Minutes left until `deadline`, rounded up. `None` once the deadline is
/// reached.
pub fn minutes_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Option<u32> {
    let remaining_ms = (deadline - now).num_milliseconds();
    if remaining_ms <= 0 {
        return None;
    }
    let minutes = (remaining_ms + 59_999) / 60_000;
    Some(u32::try_from(minutes).unwrap_or(u32::MAX))
}

#[cfg(test)]
pub mod testing {
    use super::Clock;
    use chrono::{DateTime, Utc};

    /// Clock that follows Tokio's (possibly paused) time from a fixed wall
    /// anchor, so `start_paused` tests drive both timers and timestamps.
    pub struct TokioClock {
        anchor: DateTime<Utc>,
        started: tokio::time::Instant,
    }

    impl TokioClock {
        pub fn new() -> Self {
            Self {
                anchor: Utc::now(),
                started: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = tokio::time::Instant::now() - self.started;
            self.anchor + chrono::Duration::from_std(elapsed).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_minutes_until_rounds_up() {
        let now = Utc::now();
        assert_eq!(minutes_until(now, now + Duration::minutes(5)), Some(5));
        assert_eq!(minutes_until(now, now + Duration::seconds(241)), Some(5));
        assert_eq!(minutes_until(now, now + Duration::seconds(240)), Some(4));
        assert_eq!(minutes_until(now, now + Duration::seconds(1)), Some(1));
    }

    #[test]
    fn test_minutes_until_elapsed() {
        let now = Utc::now();
        assert_eq!(minutes_until(now, now), None);
        assert_eq!(minutes_until(now, now - Duration::minutes(1)), None);
    }
}
