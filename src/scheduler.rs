//! Deferred-task scheduler for the reconnect probe and the expiry task.
//!
//! Each [`TaskId`] has at most one outstanding registration. A registration
//! owns a timer task that waits for its [`Trigger`] and then hands the run to a
//! single worker, so task bodies execute strictly one after another. Every
//! registration carries a generation number; a trigger that fires for a
//! registration which has since been superseded or cancelled is dropped by the
//! worker instead of running.
//!
//! Cancellation is cooperative. The body receives a [`TaskContext`] holding a
//! `CancellationToken`; [`TaskScheduler::cancel_all`] fires that token and the
//! body is expected to give up at its next checkpoint. Re-registration from a
//! body goes through [`TaskContext::reschedule`], which checks the token under
//! the scheduler lock, so once `cancel_all` returns nothing can re-arm.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::KeeperError;
use crate::facade::NetworkMonitor;
use crate::models::{NetworkClass, NetworkStatus};
use crate::settings::Settings;
use crate::utils::jittered;

/// The two deferred tasks this crate runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    Reconnect,
    Expire,
}

impl TaskId {
    pub const ALL: [TaskId; 2] = [TaskId::Reconnect, TaskId::Expire];

    /// Host-facing job id, as configured in settings
    pub fn job_id(self, settings: &Settings) -> i32 {
        match self {
            TaskId::Reconnect => settings.reconnect_job_id,
            TaskId::Expire => settings.clear_job_id,
        }
    }

    pub fn from_job_id(job_id: i32, settings: &Settings) -> Result<Self, KeeperError> {
        TaskId::ALL
            .into_iter()
            .find(|id| id.job_id(settings) == job_id)
            .ok_or_else(|| KeeperError::NotConfigured(format!("no task for job id {}", job_id)))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskId::Reconnect => "reconnect",
            TaskId::Expire => "expire",
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition under which a registered task becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A network of the given class is (newly) available
    NetworkAvailable(NetworkClass),
    /// At least this much time has elapsed since registration
    Delay(Duration),
}

/// How a body ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Rescheduled(Trigger),
    Finished,
}

/// Routes a due task to its body.
pub trait TaskHandler: Send + Sync {
    fn run(
        &self,
        id: TaskId,
        ctx: TaskContext,
    ) -> BoxFuture<'static, Result<TaskOutcome, KeeperError>>;
}

struct Registration {
    generation: u64,
    trigger: Trigger,
    cancel: CancellationToken,
}

struct Dispatch {
    id: TaskId,
    generation: u64,
}

#[derive(Default)]
struct SchedulerState {
    registrations: HashMap<TaskId, Registration>,
    running: HashMap<TaskId, CancellationToken>,
    next_generation: u64,
}

struct SchedulerShared {
    state: Mutex<SchedulerState>,
    dispatch_tx: mpsc::UnboundedSender<Dispatch>,
    network: Arc<dyn NetworkMonitor>,
    recheck_interval: Duration,
    shutdown: CancellationToken,
}

impl SchedulerShared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller holds the lock. Replaces whatever was registered for `id`.
    fn register_locked(&self, state: &mut SchedulerState, id: TaskId, trigger: Trigger) -> u64 {
        let generation = state.next_generation;
        state.next_generation += 1;
        let cancel = self.shutdown.child_token();

        if let Some(previous) = state.registrations.insert(
            id,
            Registration {
                generation,
                trigger,
                cancel: cancel.clone(),
            },
        ) {
            previous.cancel.cancel();
            debug!(task = %id, old = ?previous.trigger, new = ?trigger, "Superseded pending registration");
        } else {
            debug!(task = %id, ?trigger, "Registered task");
        }

        let timer = TriggerTimer {
            id,
            generation,
            trigger,
            cancel,
            dispatch_tx: self.dispatch_tx.clone(),
            network: self.network.clone(),
            recheck_interval: self.recheck_interval,
        };
        tokio::spawn(timer.run());
        generation
    }
}

/// Waits for one registration's trigger and hands it to the worker.
struct TriggerTimer {
    id: TaskId,
    generation: u64,
    trigger: Trigger,
    cancel: CancellationToken,
    dispatch_tx: mpsc::UnboundedSender<Dispatch>,
    network: Arc<dyn NetworkMonitor>,
    recheck_interval: Duration,
}

impl TriggerTimer {
    async fn run(self) {
        let fired = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.wait() => true,
        };
        if !fired {
            trace!(task = %self.id, generation = self.generation, "Timer cancelled");
            return;
        }
        trace!(task = %self.id, generation = self.generation, "Trigger satisfied");
        let _ = self.dispatch_tx.send(Dispatch {
            id: self.id,
            generation: self.generation,
        });
    }

    async fn wait(&self) {
        match self.trigger {
            Trigger::Delay(delay) => sleep(delay).await,
            Trigger::NetworkAvailable(class) => self.wait_for_network(class).await,
        }
    }

    /// Fires on a change to a satisfying status, or on a periodic re-check
    /// that finds the network already satisfying.
    async fn wait_for_network(&self, class: NetworkClass) {
        let mut feed: Option<watch::Receiver<NetworkStatus>> = Some(self.network.subscribe());
        if let Some(rx) = feed.as_mut() {
            // Only changes after registration count
            let _ = rx.borrow_and_update();
        }

        loop {
            let recheck = sleep(jittered(self.recheck_interval));
            tokio::pin!(recheck);

            let wake = match feed.as_mut() {
                Some(rx) => tokio::select! {
                    changed = rx.changed() => match changed {
                        Ok(()) => NetworkWake::Changed(rx.borrow_and_update().satisfies(class)),
                        Err(_) => NetworkWake::FeedClosed,
                    },
                    _ = &mut recheck => NetworkWake::Recheck,
                },
                None => {
                    recheck.await;
                    NetworkWake::Recheck
                }
            };

            match wake {
                NetworkWake::Changed(true) => return,
                NetworkWake::Changed(false) => {}
                NetworkWake::FeedClosed => {
                    warn!(task = %self.id, "Network feed closed, falling back to periodic re-checks");
                    feed = None;
                }
                NetworkWake::Recheck => {
                    if self.network.probe().await.satisfies(class) {
                        return;
                    }
                }
            }
        }
    }
}

enum NetworkWake {
    Changed(bool),
    FeedClosed,
    Recheck,
}

/// Handed to every task body. Carries the body's cancellation token and the
/// only way for a body to re-arm itself.
pub struct TaskContext {
    id: TaskId,
    cancel: CancellationToken,
    shared: Arc<SchedulerShared>,
}

impl TaskContext {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Safe point: bail out with [`KeeperError::Cancelled`] if cancelled.
    pub fn ensure_active(&self) -> Result<(), KeeperError> {
        if self.cancel.is_cancelled() {
            debug!(task = %self.id, "Cancellation observed at checkpoint");
            return Err(KeeperError::Cancelled);
        }
        Ok(())
    }

    /// Await `fut` unless the task is cancelled first.
    pub async fn checkpoint<F: Future>(&self, fut: F) -> Result<F::Output, KeeperError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(task = %self.id, "Cancelled while waiting");
                Err(KeeperError::Cancelled)
            }
            out = fut => Ok(out),
        }
    }

    /// Register the next run of this task. Refused once cancelled.
    pub fn reschedule(&self, trigger: Trigger) -> Result<TaskOutcome, KeeperError> {
        let mut state = self.shared.lock();
        if self.cancel.is_cancelled() {
            debug!(task = %self.id, "Not rescheduling a cancelled task");
            return Err(KeeperError::Cancelled);
        }
        self.shared.register_locked(&mut state, self.id, trigger);
        Ok(TaskOutcome::Rescheduled(trigger))
    }
}

/// Owns the registrations and the single worker that runs task bodies.
#[derive(Clone)]
pub struct TaskScheduler {
    shared: Arc<SchedulerShared>,
}

impl TaskScheduler {
    /// Must be called from within a tokio runtime; spawns the worker.
    pub fn new(
        handler: Arc<dyn TaskHandler>,
        network: Arc<dyn NetworkMonitor>,
        settings: &Settings,
    ) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SchedulerShared {
            state: Mutex::new(SchedulerState::default()),
            dispatch_tx,
            network,
            recheck_interval: settings.network_recheck_interval,
            shutdown: CancellationToken::new(),
        });

        let worker = Worker {
            shared: Arc::downgrade(&shared),
            shutdown: shared.shutdown.clone(),
            handler,
        };
        tokio::spawn(worker.run(dispatch_rx));

        Self { shared }
    }

    /// Register `id` to run once `trigger` is satisfied. Any earlier
    /// registration for `id` is superseded; the last call wins.
    pub fn schedule(&self, id: TaskId, trigger: Trigger) {
        let mut state = self.shared.lock();
        self.shared.register_locked(&mut state, id, trigger);
    }

    /// Run `id` now, superseding its pending registration if any.
    pub fn on_trigger(&self, id: TaskId) {
        let mut state = self.shared.lock();
        let generation = self
            .shared
            .register_locked(&mut state, id, Trigger::Delay(Duration::ZERO));
        let _ = self.shared.dispatch_tx.send(Dispatch { id, generation });
    }

    /// Drop the registration for `id` and interrupt its running body.
    pub fn cancel(&self, id: TaskId) {
        let mut state = self.shared.lock();
        Self::cancel_locked(&mut state, id);
    }

    /// Drop every registration and interrupt whatever body is running.
    pub fn cancel_all(&self) {
        let mut state = self.shared.lock();
        for id in TaskId::ALL {
            Self::cancel_locked(&mut state, id);
        }
        info!("Cancelled all scheduled tasks");
    }

    fn cancel_locked(state: &mut SchedulerState, id: TaskId) {
        if let Some(registration) = state.registrations.remove(&id) {
            registration.cancel.cancel();
            debug!(task = %id, "Cancelled pending registration");
        }
        if let Some(running) = state.running.get(&id) {
            running.cancel();
            debug!(task = %id, "Interrupting running task");
        }
    }

    /// Cancel everything and stop the worker for good.
    pub fn shutdown(&self) {
        self.cancel_all();
        self.shared.shutdown.cancel();
    }

    pub fn pending(&self, id: TaskId) -> Option<Trigger> {
        self.shared
            .lock()
            .registrations
            .get(&id)
            .map(|registration| registration.trigger)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock().registrations.len()
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        self.shared.lock().running.contains_key(&id)
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        let pending: Vec<_> = state
            .registrations
            .iter()
            .map(|(id, registration)| (*id, registration.trigger))
            .collect();
        f.debug_struct("TaskScheduler")
            .field("pending", &pending)
            .field("running", &state.running.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct Worker {
    shared: Weak<SchedulerShared>,
    shutdown: CancellationToken,
    handler: Arc<dyn TaskHandler>,
}

impl Worker {
    async fn run(self, mut dispatch_rx: mpsc::UnboundedReceiver<Dispatch>) {
        debug!("Task worker started");
        loop {
            let dispatch = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = dispatch_rx.recv() => match next {
                    Some(dispatch) => dispatch,
                    None => break,
                },
            };
            let Some(shared) = self.shared.upgrade() else {
                break;
            };
            self.run_one(shared, dispatch).await;
        }
        debug!("Task worker finished");
    }

    async fn run_one(&self, shared: Arc<SchedulerShared>, dispatch: Dispatch) {
        let id = dispatch.id;
        let cancel = {
            let mut state = shared.lock();
            let current = state
                .registrations
                .get(&id)
                .is_some_and(|registration| registration.generation == dispatch.generation);
            if !current {
                trace!(task = %id, generation = dispatch.generation, "Dropping stale trigger");
                return;
            }
            let Some(registration) = state.registrations.remove(&id) else {
                return;
            };
            state.running.insert(id, registration.cancel.clone());
            registration.cancel
        };

        debug!(task = %id, "Running task");
        let ctx = TaskContext {
            id,
            cancel: cancel.clone(),
            shared: shared.clone(),
        };
        let body = self.handler.run(id, ctx);
        // Spawned so a panicking body surfaces as a JoinError instead of killing the worker
        let result = tokio::spawn(body).await;

        shared.lock().running.remove(&id);

        match result {
            Ok(Ok(TaskOutcome::Rescheduled(trigger))) => {
                debug!(task = %id, ?trigger, "Task finished and re-armed");
            }
            Ok(Ok(TaskOutcome::Finished)) => {
                info!(task = %id, "Task finished without rescheduling");
            }
            Ok(Err(e)) if e.is_cancelled() => {
                debug!(task = %id, "Task stopped after cancellation");
            }
            Ok(Err(e)) => {
                error!(task = %id, error = %e, "Task failed; not rescheduling");
            }
            Err(e) => {
                let e = KeeperError::from(e);
                error!(task = %id, error = %e, "Task panicked; not rescheduling");
            }
        }
    }
}
