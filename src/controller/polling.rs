use std::sync::Weak;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

use super::Shared;

/// Checks the job status every `period`, starting one period from now, until
/// the job reaches a terminal state or this loop is superseded.
pub(super) async fn run_poll_loop(shared: Weak<Shared>, generation: u64, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if shared.poll_tick(generation).await.is_break() {
            tracing::debug!(generation, "Poll loop finished");
            return;
        }
    }
}

/// Recomputes the cooldown immediately, then every `period`, until it runs
/// out.
pub(super) async fn run_countdown(shared: Weak<Shared>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if shared.countdown_tick().is_break() {
            tracing::debug!("Countdown finished");
            return;
        }
    }
}
