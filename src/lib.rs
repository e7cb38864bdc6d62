pub mod actions;
pub use actions::{ActionButton, ActionIcon, ActionKind, ButtonContext, DisplayAction};
pub mod artwork;
pub use artwork::{ArtworkLoader, HttpArtworkLoader};
pub mod display;
pub use display::coordinator::{CoordinatorHandle, StatusDisplayCoordinator};
pub use display::record::{ArtworkToken, Effect, StatusInput, StatusRecord};
pub use display::{DisplayConfig, DisplayContent, DisplaySurface, IdlePolicy, VisibilityMode};
mod error;
pub use error::KeeperError;
mod events;
pub use events::SessionEvent;
mod expiry;
pub use expiry::compute_remaining_time;
pub mod facade;
pub use facade::{NetworkMonitor, SessionFacade, WatchNetworkMonitor};
mod models;
pub use models::{
    Artwork, MediaInfo, MediaMetadata, NetworkClass, NetworkStatus, QueueItem, QueueState,
    RepeatMode, StreamType,
};
mod reconnect;
pub mod scheduler;
pub use scheduler::{TaskContext, TaskHandler, TaskId, TaskOutcome, TaskScheduler, Trigger};
mod settings;
pub use settings::{Settings, SETTINGS};
pub mod store;
pub use store::{JsonFileStore, MemoryStore, PersistedState, PreferenceStore};
mod utils;
pub use utils::{env_parse, HasPlaybackState, IdleReason, PlaybackStatus};

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use expiry::SessionExpiry;
use reconnect::ReconnectProbe;

/// Routes due tasks to their bodies.
struct KeeperTasks {
    probe: ReconnectProbe,
    expiry: SessionExpiry,
}

impl TaskHandler for KeeperTasks {
    fn run(
        &self,
        id: TaskId,
        ctx: TaskContext,
    ) -> BoxFuture<'static, Result<TaskOutcome, KeeperError>> {
        match id {
            TaskId::Reconnect => self.probe.clone().run(ctx).boxed(),
            TaskId::Expire => self.expiry.clone().run(ctx).boxed(),
        }
    }
}

/// Builder for [`SessionKeeper`]. The facade and the network monitor are
/// required; the store falls back to `KEEPER_STORE_PATH` (or memory) and the
/// settings to [`SETTINGS`].
#[derive(Default)]
pub struct SessionKeeperBuilder {
    facade: Option<Arc<dyn SessionFacade>>,
    network: Option<Arc<dyn NetworkMonitor>>,
    store: Option<Arc<dyn PreferenceStore>>,
    settings: Option<Settings>,
}

impl SessionKeeperBuilder {
    pub fn facade(mut self, facade: Arc<dyn SessionFacade>) -> Self {
        self.facade = Some(facade);
        self
    }

    pub fn network(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn store(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Wires everything together and spawns the scheduler's worker, so this
    /// must run inside a tokio runtime.
    pub fn build(self) -> Result<SessionKeeper, KeeperError> {
        let facade = self
            .facade
            .ok_or_else(|| KeeperError::NotConfigured("session facade missing".to_string()))?;
        let network = self
            .network
            .ok_or_else(|| KeeperError::NotConfigured("network monitor missing".to_string()))?;
        let settings = self.settings.unwrap_or_else(|| SETTINGS.clone());

        let store: Arc<dyn PreferenceStore> = match (self.store, &settings.store_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(JsonFileStore::open(path)?),
            (None, None) => {
                debug!("No preference store configured, keeping state in memory");
                Arc::new(MemoryStore::new())
            }
        };
        let persisted = PersistedState::new(store);

        let tasks = KeeperTasks {
            probe: ReconnectProbe {
                facade: facade.clone(),
                network: network.clone(),
                persisted: persisted.clone(),
                window: settings.reconnect_window,
                required: settings.required_network,
            },
            expiry: SessionExpiry {
                facade: facade.clone(),
                persisted: persisted.clone(),
                fallback: settings.live_stream_fallback,
            },
        };
        let scheduler = TaskScheduler::new(Arc::new(tasks), network.clone(), &settings);

        Ok(SessionKeeper {
            facade,
            network,
            persisted,
            scheduler,
            settings,
        })
    }
}

/// Keeps a casting session alive across connectivity loss and restarts.
///
/// Owns the [`TaskScheduler`] running the reconnect probe and the expiry
/// task, and the [`PersistedState`] both of them write. Dropping the keeper
/// shuts the scheduler down.
///
/// # Logging
///
/// This library uses the `tracing` crate for logging. To see its output,
/// initialize a subscriber in your application:
/// ```no_run
/// use tracing::Level;
/// use tracing_subscriber::FmtSubscriber;
///
/// let subscriber = FmtSubscriber::builder()
///     .with_max_level(Level::DEBUG)
///     .finish();
///
/// tracing::subscriber::set_global_default(subscriber)
///     .expect("Failed to set tracing subscriber");
/// ```
///
/// The log levels control what information is displayed:
/// - `TRACE`: timer wake-ups, dropped stale triggers, duplicate statuses
/// - `DEBUG`: registrations, cancellations, display transitions
/// - `INFO`: reconnection attempts, session clean-up, task completion
/// - `WARN`: persistence and surface failures that were skipped over
/// - `ERROR`: failed remote queries and failed task bodies
pub struct SessionKeeper {
    facade: Arc<dyn SessionFacade>,
    network: Arc<dyn NetworkMonitor>,
    persisted: PersistedState,
    scheduler: TaskScheduler,
    settings: Settings,
}

impl SessionKeeper {
    pub fn builder() -> SessionKeeperBuilder {
        SessionKeeperBuilder::default()
    }

    /// Called when a cast session starts: arms the reconnect probe and the
    /// expiry task.
    pub async fn start(&self) {
        info!(device = %self.facade.device_name(), "Keeping cast session alive");
        self.start_reconnect_probe().await;
        self.start_expiry().await;
    }

    /// Records whether a named network is joined and waits for the required one.
    pub async fn start_reconnect_probe(&self) {
        let required = self.settings.required_network;
        let status = self.network.probe().await;
        if let Err(e) = self.persisted.set_wifi_status(status.has_network_identity()) {
            warn!(error = %e, "Failed to persist connectivity signal");
        }
        self.scheduler
            .schedule(TaskId::Reconnect, Trigger::NetworkAvailable(required));
    }

    /// Persists when the current media should end and arms the expiry task
    /// for that moment.
    pub async fn start_expiry(&self) {
        let remaining =
            compute_remaining_time(self.facade.as_ref(), self.settings.live_stream_fallback)
                .await;
        if let Err(e) = self
            .persisted
            .set_media_end_deadline(SystemTime::now() + remaining)
        {
            warn!(error = %e, "Failed to persist media end deadline");
        }
        self.scheduler.schedule(TaskId::Expire, Trigger::Delay(remaining));
    }

    /// Called when the session ends on purpose. Nothing persisted is touched.
    pub fn stop(&self) {
        self.scheduler.cancel_all();
    }

    /// Rebuilds the schedule after a process restart from what was persisted.
    /// Returns true when a media deadline was found.
    pub fn resume(&self) -> bool {
        self.scheduler.schedule(
            TaskId::Reconnect,
            Trigger::NetworkAvailable(self.settings.required_network),
        );

        match self.persisted.remaining_until_deadline() {
            Some(remaining) => {
                info!(?remaining, "Resuming expiry from persisted deadline");
                self.scheduler.schedule(TaskId::Expire, Trigger::Delay(remaining));
                true
            }
            None => {
                debug!("No persisted media deadline, expiry not armed");
                false
            }
        }
    }

    /// Entry point for the host's own job scheduler: runs the task registered
    /// under `job_id` right away.
    pub fn on_job_triggered(&self, job_id: i32) -> Result<(), KeeperError> {
        let id = TaskId::from_job_id(job_id, &self.settings)?;
        debug!(job_id, task = %id, "Host triggered job");
        self.scheduler.on_trigger(id);
        Ok(())
    }

    /// Starts a status display coordinator against this keeper's facade.
    pub fn spawn_display(
        &self,
        surface: Arc<dyn DisplaySurface>,
        loader: Arc<dyn ArtworkLoader>,
    ) -> CoordinatorHandle {
        StatusDisplayCoordinator::spawn(self.facade.clone(), surface, loader, &self.settings)
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn persisted(&self) -> &PersistedState {
        &self.persisted
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl std::fmt::Debug for SessionKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeeper")
            .field("scheduler", &self.scheduler)
            .field("persisted", &self.persisted)
            .finish()
    }
}

impl Drop for SessionKeeper {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}
