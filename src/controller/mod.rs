//! The news-sentiment refresh controller.
//!
//! Mediates one refresh job at a time against a backend that enforces its own
//! cooldown. State changes are made by synchronous handlers under a mutex that
//! is never held across an `.await`, so every trigger/tick transition is
//! atomic. The poll loop and the cooldown countdown are spawned Tokio tasks
//! that are aborted on every exit path.

mod events;
mod polling;
mod state;

use crate::client::JobStatusClient;
use crate::core::clock::Clock;
use crate::core::models::{JobStatus, StartOutcome, UpdateEvent};
use crate::core::store::{PersistedState, StateStore};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use events::EventBus;
pub use state::{cooldown_text, ControllerView, Phase};

use state::{RefreshState, Restored};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub countdown_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(120),
            countdown_interval: Duration::from_secs(60),
        }
    }
}

/// What a single `trigger_update` call led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The backend accepted the job; the poll loop is running.
    Polling,
    /// The backend asked us to wait this many minutes.
    Cooldown { minutes: u32 },
    /// The backend rate limited us with nothing left to wait for.
    Ready,
    Failed,
}

struct PollTask {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    state: RefreshState,
    poll: Option<PollTask>,
    countdown: Option<JoinHandle<()>>,
    generation: u64,
    persisted: PersistedState,
}

impl Inner {
    fn cancel_poll(&mut self) {
        if let Some(task) = self.poll.take() {
            task.handle.abort();
        }
    }

    fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    fn is_current_poll(&self, generation: u64) -> bool {
        self.poll
            .as_ref()
            .is_some_and(|task| task.generation == generation)
    }
}

struct Shared {
    client: Arc<dyn JobStatusClient>,
    store: StateStore,
    events: EventBus,
    timing: Timing,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    view_tx: watch::Sender<ControllerView>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        inner.cancel_poll();
        inner.cancel_countdown();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn poll_timeout(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.timing.poll_timeout).unwrap_or(chrono::Duration::MAX)
    }

    /// Writes the durable snapshot if it changed and publishes a fresh view.
    fn commit(&self, inner: &mut Inner) {
        let snapshot = inner.state.persisted();
        if snapshot != inner.persisted {
            let result = if snapshot.is_empty() {
                self.store.clear()
            } else {
                self.store.save(&snapshot)
            };
            match result {
                Ok(()) => inner.persisted = snapshot,
                Err(e) => tracing::warn!(error = %e, "Failed to persist refresh state"),
            }
        }
        self.view_tx.send_replace(inner.state.view());
    }

    fn start_poll_loop(self: &Arc<Self>, inner: &mut Inner) {
        inner.cancel_poll();
        inner.generation += 1;
        let generation = inner.generation;
        let handle = tokio::spawn(polling::run_poll_loop(
            Arc::downgrade(self),
            generation,
            self.timing.poll_interval,
        ));
        inner.poll = Some(PollTask { generation, handle });
    }

    fn start_countdown(self: &Arc<Self>, inner: &mut Inner) {
        inner.cancel_countdown();
        inner.countdown = Some(tokio::spawn(polling::run_countdown(
            Arc::downgrade(self),
            self.timing.countdown_interval,
        )));
    }

    /// Returns `false` when `minutes` was zero and the state is `Ready`.
    fn enter_cooldown(self: &Arc<Self>, inner: &mut Inner, minutes: u32) -> bool {
        inner.cancel_poll();
        let waiting = inner.state.enter_cooldown(self.clock.now(), minutes);
        if waiting {
            self.start_countdown(inner);
        } else {
            inner.cancel_countdown();
        }
        waiting
    }

    /// Common landing for every failure: back to `Ready`, nothing persisted,
    /// listeners told.
    fn fail(&self, mut inner: MutexGuard<'_, Inner>, reason: String) {
        inner.cancel_poll();
        inner.cancel_countdown();
        inner.state.fail(reason);
        self.commit(&mut inner);
        drop(inner);
        self.events.emit(UpdateEvent::Failed);
    }

    fn restore(self: &Arc<Self>) {
        let mut inner = self.lock();

        let snapshot = match self.store.load() {
            Ok(Some(snapshot)) if snapshot.is_empty() => {
                tracing::debug!("Removing empty refresh state");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "Failed to remove empty refresh state");
                }
                self.commit(&mut inner);
                return;
            }
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.commit(&mut inner);
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable refresh state");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "Failed to remove unreadable refresh state");
                }
                self.commit(&mut inner);
                return;
            }
        };

        inner.persisted = snapshot.clone();
        match inner
            .state
            .restore(&snapshot, self.clock.now(), self.poll_timeout())
        {
            Restored::Cooldown => {
                tracing::info!(
                    minutes = ?inner.state.view().minutes_remaining,
                    "Restored cooldown"
                );
                self.start_countdown(&mut inner);
            }
            Restored::Polling => {
                tracing::info!(
                    started_at = ?inner.state.polling_started_at(),
                    "Resuming poll of in-flight update"
                );
                self.start_poll_loop(&mut inner);
            }
            Restored::Discarded => {
                tracing::info!("Stored refresh state has expired, discarding");
            }
            Restored::Nothing => {}
        }
        self.commit(&mut inner);
    }

    async fn poll_tick(self: &Arc<Self>, generation: u64) -> ControlFlow<()> {
        {
            let inner = self.lock();
            if !inner.is_current_poll(generation) {
                return ControlFlow::Break(());
            }
            if inner
                .state
                .poll_timed_out(self.clock.now(), self.poll_timeout())
            {
                tracing::warn!(
                    timeout_secs = self.timing.poll_timeout.as_secs(),
                    "Update did not finish in time, giving up"
                );
                self.fail(inner, "update timed out".to_string());
                return ControlFlow::Break(());
            }
        }

        let result = self.client.fetch_status().await;

        let mut inner = self.lock();
        if !inner.is_current_poll(generation) {
            return ControlFlow::Break(());
        }

        match result {
            Ok(JobStatus::Idle {
                minutes_until_next_update,
            }) => {
                let minutes = minutes_until_next_update.unwrap_or(0);
                tracing::info!(minutes, "Update completed");
                self.enter_cooldown(&mut inner, minutes);
                self.commit(&mut inner);
                drop(inner);
                self.events.emit(UpdateEvent::Completed);
                ControlFlow::Break(())
            }
            Ok(JobStatus::Failed { message }) => {
                let reason = message.unwrap_or_else(|| "update failed".to_string());
                tracing::warn!(error = %reason, "Backend reported update failure");
                self.fail(inner, reason);
                ControlFlow::Break(())
            }
            Ok(status) => {
                tracing::debug!(status = status.label(), "Update still in progress");
                ControlFlow::Continue(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch update status");
                self.fail(inner, e.to_string());
                ControlFlow::Break(())
            }
        }
    }

    fn countdown_tick(&self) -> ControlFlow<()> {
        let mut inner = self.lock();
        let finished = inner.state.tick_countdown(self.clock.now());
        if finished {
            tracing::info!("Cooldown elapsed, update available");
            // Dropping the handle leaves this task to return on its own.
            inner.countdown = None;
        }
        self.commit(&mut inner);

        if finished {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Handle to the refresh controller. Cheap to clone; all clones drive the
/// same state. Dropping the last handle cancels the timers.
#[derive(Clone)]
pub struct UpdateController {
    shared: Arc<Shared>,
}

impl UpdateController {
    /// Builds the controller and restores any persisted state. Must be called
    /// from within a Tokio runtime.
    pub fn new(
        client: Arc<dyn JobStatusClient>,
        store: StateStore,
        events: EventBus,
        timing: Timing,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = RefreshState::new();
        let (view_tx, _) = watch::channel(state.view());

        let shared = Arc::new(Shared {
            client,
            store,
            events,
            timing,
            clock,
            inner: Mutex::new(Inner {
                state,
                poll: None,
                countdown: None,
                generation: 0,
                persisted: PersistedState::default(),
            }),
            view_tx,
        });
        shared.restore();

        Self { shared }
    }

    pub fn view(&self) -> ControllerView {
        self.shared.lock().state.view()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ControllerView> {
        self.shared.view_tx.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn is_poll_loop_active(&self) -> bool {
        self.shared
            .lock()
            .poll
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub async fn trigger_update(&self) -> TriggerOutcome {
        let shared = &self.shared;
        {
            let mut inner = shared.lock();
            // A countdown expiring mid-request must not re-enable the control.
            inner.cancel_countdown();
            inner.state.begin_submit();
            shared.commit(&mut inner);
        }
        tracing::info!("Requesting news sentiment update");

        let result = shared.client.start_update().await;

        let mut inner = shared.lock();
        match result {
            Ok(StartOutcome::Accepted) => {
                tracing::info!("Update accepted, polling for completion");
                inner.cancel_countdown();
                inner.state.enter_polling(shared.clock.now());
                shared.start_poll_loop(&mut inner);
                shared.commit(&mut inner);
                TriggerOutcome::Polling
            }
            Ok(StartOutcome::RateLimited { minutes }) => {
                tracing::info!(minutes, "Update rate limited");
                let waiting = shared.enter_cooldown(&mut inner, minutes);
                shared.commit(&mut inner);
                if waiting {
                    TriggerOutcome::Cooldown { minutes }
                } else {
                    TriggerOutcome::Ready
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start update");
                shared.fail(inner, e.to_string());
                TriggerOutcome::Failed
            }
        }
    }

    /// Stops both timers and resets the in-memory state to `Ready`. Persisted
    /// state is left in place so a later run can resume it; a trigger on this
    /// handle afterwards starts over and replaces it.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        inner.cancel_poll();
        inner.cancel_countdown();
        inner.state = RefreshState::new();
        self.shared.view_tx.send_replace(inner.state.view());
        tracing::debug!("Update controller shut down");
    }
}
