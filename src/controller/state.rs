use crate::core::clock::minutes_until;
use crate::core::store::PersistedState;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

const TEXT_DEFAULT: &str = "Update latest news";
const TEXT_LOADING: &str = "Currently updating latest news...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Ready,
    Submitting,
    Polling,
    Cooldown,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Ready => "ready",
            Phase::Submitting => "submitting",
            Phase::Polling => "polling",
            Phase::Cooldown => "cooldown",
        }
    }
}

/// Snapshot of the controller that UI-side consumers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerView {
    pub phase: Phase,
    pub update_available: bool,
    pub button_text: String,
    pub minutes_remaining: Option<u32>,
    pub polling: bool,
    /// Reason the most recent attempt failed, cleared by the next trigger.
    pub last_failure: Option<String>,
}

pub fn cooldown_text(minutes: u32) -> String {
    let plural = if minutes == 1 { "" } else { "s" };
    format!("Updated recently. Try in {minutes} minute{plural}.")
}

/// Result of reconciling a persisted snapshot with the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restored {
    Nothing,
    Cooldown,
    Polling,
    Discarded,
}

#[derive(Debug, Clone)]
pub struct RefreshState {
    phase: Phase,
    next_available_at: Option<DateTime<Utc>>,
    minutes_remaining: Option<u32>,
    polling_started_at: Option<DateTime<Utc>>,
    last_failure: Option<String>,
}

impl RefreshState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Ready,
            next_available_at: None,
            minutes_remaining: None,
            polling_started_at: None,
            last_failure: None,
        }
    }

    pub fn polling_started_at(&self) -> Option<DateTime<Utc>> {
        self.polling_started_at
    }

    pub fn is_polling(&self) -> bool {
        self.polling_started_at.is_some()
    }

    pub fn update_available(&self) -> bool {
        self.phase == Phase::Ready
    }

    pub fn button_text(&self) -> String {
        match self.phase {
            Phase::Ready => TEXT_DEFAULT.to_string(),
            Phase::Submitting | Phase::Polling => TEXT_LOADING.to_string(),
            Phase::Cooldown => cooldown_text(self.minutes_remaining.unwrap_or(0)),
        }
    }

    pub fn view(&self) -> ControllerView {
        ControllerView {
            phase: self.phase,
            update_available: self.update_available(),
            button_text: self.button_text(),
            minutes_remaining: self.minutes_remaining,
            polling: self.is_polling(),
            last_failure: self.last_failure.clone(),
        }
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState::new(self.next_available_at, self.polling_started_at)
    }

    pub fn begin_submit(&mut self) {
        self.phase = Phase::Submitting;
        self.last_failure = None;
    }

    pub fn enter_polling(&mut self, started_at: DateTime<Utc>) {
        self.phase = Phase::Polling;
        self.polling_started_at = Some(started_at);
        self.next_available_at = None;
        self.minutes_remaining = None;
    }

    /// Starts a cooldown of `minutes` from `now`. Returns `false` when there
    /// is nothing to wait for and the state went straight to `Ready`.
    pub fn enter_cooldown(&mut self, now: DateTime<Utc>, minutes: u32) -> bool {
        self.polling_started_at = None;
        if minutes == 0 {
            self.enter_ready();
            return false;
        }
        self.phase = Phase::Cooldown;
        self.next_available_at = Some(now + Duration::minutes(i64::from(minutes)));
        self.minutes_remaining = Some(minutes);
        true
    }

    pub fn enter_ready(&mut self) {
        self.phase = Phase::Ready;
        self.next_available_at = None;
        self.minutes_remaining = None;
        self.polling_started_at = None;
    }

    pub fn fail(&mut self, reason: String) {
        self.enter_ready();
        self.last_failure = Some(reason);
    }

    /// Recomputes the remaining cooldown. Returns `true` once the cooldown is
    /// over and the state is back to `Ready`.
    pub fn tick_countdown(&mut self, now: DateTime<Utc>) -> bool {
        let Some(deadline) = self.next_available_at else {
            return true;
        };
        match minutes_until(now, deadline) {
            Some(minutes) => {
                self.minutes_remaining = Some(minutes);
                false
            }
            None => {
                self.enter_ready();
                true
            }
        }
    }

    pub fn poll_timed_out(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.polling_started_at
            .is_some_and(|started| now - started >= timeout)
    }

    pub fn restore(
        &mut self,
        snapshot: &PersistedState,
        now: DateTime<Utc>,
        poll_timeout: Duration,
    ) -> Restored {
        if let Some(deadline) = snapshot.next_available_at() {
            return match minutes_until(now, deadline) {
                Some(minutes) => {
                    self.phase = Phase::Cooldown;
                    self.next_available_at = Some(deadline);
                    self.minutes_remaining = Some(minutes);
                    Restored::Cooldown
                }
                None => Restored::Discarded,
            };
        }

        if let Some(started) = snapshot.polling_started_at() {
            if now - started < poll_timeout {
                self.enter_polling(started);
                return Restored::Polling;
            }
            return Restored::Discarded;
        }

        Restored::Nothing
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new()
    }
}
