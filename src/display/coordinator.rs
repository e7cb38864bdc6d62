use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::record::{ArtworkToken, Effect, StatusInput, StatusRecord};
use super::{DisplayConfig, DisplaySurface};
use crate::artwork::ArtworkLoader;
use crate::error::KeeperError;
use crate::events::SessionEvent;
use crate::facade::SessionFacade;
use crate::models::{Artwork, MediaInfo};
use crate::settings::Settings;
use crate::utils::PlaybackStatus;

enum StatusCommand {
    SetDisplayVisible(bool),
    Shutdown,
}

struct ArtworkDone {
    token: ArtworkToken,
    result: Result<Artwork, KeeperError>,
}

/// Spawns and drives the status display task.
pub struct StatusDisplayCoordinator;

impl StatusDisplayCoordinator {
    /// Subscribes to `facade` and starts the display task. Must be called from
    /// within a tokio runtime.
    pub fn spawn(
        facade: Arc<dyn SessionFacade>,
        surface: Arc<dyn DisplaySurface>,
        loader: Arc<dyn ArtworkLoader>,
        settings: &Settings,
    ) -> CoordinatorHandle {
        let capacity = settings.event_buffer_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (artwork_tx, artwork_rx) = mpsc::channel(capacity);

        let record = StatusRecord::new(DisplayConfig::from(settings), facade.device_name());
        let (record_tx, record_rx) = watch::channel(record.clone());

        let driver = CoordinatorLoop {
            events: facade.subscribe(),
            facade,
            surface,
            loader,
            reconnect_window: settings.reconnect_window,
            record,
            record_tx,
            command_rx,
            artwork_tx,
            artwork_rx,
            fetch: None,
        };
        let task = tokio::spawn(driver.run());

        CoordinatorHandle {
            command_tx,
            record_rx,
            task,
        }
    }
}

/// Control handle for a running coordinator.
pub struct CoordinatorHandle {
    command_tx: mpsc::Sender<StatusCommand>,
    record_rx: watch::Receiver<StatusRecord>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Host-driven visibility of the status display, e.g. when the app goes
    /// to the background. Re-checks the playback status first.
    pub async fn set_display_visible(&self, visible: bool) -> Result<(), KeeperError> {
        self.command_tx
            .send(StatusCommand::SetDisplayVisible(visible))
            .await
            .map_err(|_| KeeperError::CoordinatorStopped)
    }

    /// Latest published record. May trail the coordinator by one event.
    pub fn record(&self) -> StatusRecord {
        self.record_rx.borrow().clone()
    }

    pub fn watch_record(&self) -> watch::Receiver<StatusRecord> {
        self.record_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tear the display down and wait for the task to exit.
    pub async fn shutdown(self) -> Result<(), KeeperError> {
        // Already gone when the session disconnected on its own
        let _ = self.command_tx.send(StatusCommand::Shutdown).await;
        self.task.await?;
        Ok(())
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

struct CoordinatorLoop {
    facade: Arc<dyn SessionFacade>,
    surface: Arc<dyn DisplaySurface>,
    loader: Arc<dyn ArtworkLoader>,
    reconnect_window: std::time::Duration,
    events: broadcast::Receiver<SessionEvent>,
    record: StatusRecord,
    record_tx: watch::Sender<StatusRecord>,
    command_rx: mpsc::Receiver<StatusCommand>,
    artwork_tx: mpsc::Sender<ArtworkDone>,
    artwork_rx: mpsc::Receiver<ArtworkDone>,
    fetch: Option<JoinHandle<()>>,
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl CoordinatorLoop {
    async fn run(mut self) {
        info!("Status display coordinator started");
        self.start();

        loop {
            let flow = tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(StatusCommand::SetDisplayVisible(visible)) => {
                        self.on_playback_status().await;
                        let media = self.media_for_visibility().await;
                        self.apply(StatusInput::VisibilityChanged { display_visible: visible, media });
                        Flow::Continue
                    }
                    Some(StatusCommand::Shutdown) | None => {
                        debug!("Shutdown requested");
                        Flow::Stop
                    }
                },
                event = self.events.recv() => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session events lagged, re-reading playback status");
                        self.on_playback_status().await;
                        Flow::Continue
                    }
                    Err(RecvError::Closed) => {
                        info!("Session event stream closed");
                        Flow::Stop
                    }
                },
                Some(done) = self.artwork_rx.recv() => {
                    let input = match done.result {
                        Ok(artwork) => StatusInput::ArtworkLoaded { token: done.token, artwork },
                        Err(e) => {
                            warn!(error = %e, token = ?done.token, "Artwork fetch failed");
                            StatusInput::ArtworkFailed { token: done.token }
                        }
                    };
                    self.apply(input);
                    Flow::Continue
                }
            };

            if flow == Flow::Stop {
                break;
            }
        }

        self.apply(StatusInput::Teardown);
        // Dropping the receiver is what unsubscribes from the facade
        drop(self.events);
        info!("Status display coordinator finished");
    }

    fn start(&mut self) {
        if let Some(queue) = self.facade.queue_state() {
            self.apply(StatusInput::QueueUpdated {
                position: queue.current_position(),
                size: queue.size(),
            });
        }
        if !self.facade.is_connected() && !self.facade.is_connecting() {
            debug!("Session down at display start, asking for a reconnection");
            let attempt = self.facade.reconnect_if_possible(self.reconnect_window, None);
            tokio::spawn(async move {
                if let Err(e) = attempt.await {
                    warn!(error = %e, "Reconnection attempt failed");
                }
            });
        }
        self.apply(StatusInput::Started);
    }

    async fn on_event(&mut self, event: SessionEvent) -> Flow {
        trace!(event = event.event_type(), "Session event");
        if event.is_terminal() {
            info!(event = event.event_type(), "Session ended, stopping the status display");
            return Flow::Stop;
        }
        match event {
            SessionEvent::Connected => {
                debug!("Session connected");
                Flow::Continue
            }
            SessionEvent::Disconnected | SessionEvent::ApplicationDisconnected(_) => Flow::Stop,
            SessionEvent::PlaybackStateChanged => {
                self.on_playback_status().await;
                Flow::Continue
            }
            SessionEvent::QueueUpdated(queue) => {
                self.apply(StatusInput::QueueUpdated {
                    position: queue.current_position(),
                    size: queue.size(),
                });
                Flow::Continue
            }
            SessionEvent::UiVisibilityChanged(ui_visible) => {
                let media = self.media_for_visibility().await;
                // The status display stands in for the app UI while it is hidden
                self.apply(StatusInput::VisibilityChanged {
                    display_visible: !ui_visible,
                    media,
                });
                Flow::Continue
            }
        }
    }

    async fn on_playback_status(&mut self) {
        let state = self.facade.current_playback_state();
        if self.record.is_duplicate(state) {
            trace!(%state, "Duplicate playback status");
            return;
        }

        let keep_visible_when_idle = state == PlaybackStatus::Idle
            && self
                .facade
                .should_remote_ui_be_visible(state, self.facade.idle_reason());
        let media = if state.is_media_driven() || keep_visible_when_idle {
            self.current_media().await
        } else {
            None
        };

        self.apply(StatusInput::PlaybackChanged {
            state,
            media,
            keep_visible_when_idle,
        });
    }

    async fn media_for_visibility(&self) -> Option<MediaInfo> {
        if self.record.content().is_some() || self.record.is_playback_cleared() {
            return None;
        }
        self.current_media().await
    }

    async fn current_media(&self) -> Option<MediaInfo> {
        match self.facade.current_media_info().await {
            Ok(media) => media,
            Err(e) => {
                error!(error = %e, "Failed to get the remote media information");
                None
            }
        }
    }

    fn apply(&mut self, input: StatusInput) {
        let effects = self.record.apply(input);
        for effect in effects {
            self.perform(effect);
        }
        self.record_tx.send_replace(self.record.clone());
    }

    fn perform(&mut self, effect: Effect) {
        let result = match effect {
            Effect::Render(content) => self.surface.render(&content),
            Effect::Promote(content) => self.surface.promote_to_active(&content),
            Effect::Demote(template) => self.surface.demote_to_idle(template),
            Effect::Clear => {
                self.abort_fetch();
                self.surface.clear()
            }
            Effect::FetchArtwork {
                token,
                url,
                size_px,
            } => {
                self.abort_fetch();
                let fetch = self.loader.fetch(&url, size_px);
                let done_tx = self.artwork_tx.clone();
                self.fetch = Some(tokio::spawn(async move {
                    let result = fetch.await;
                    // Coordinator gone: nobody left to care
                    let _ = done_tx.send(ArtworkDone { token, result }).await;
                }));
                Ok(())
            }
            Effect::CancelArtwork => {
                self.abort_fetch();
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(error = %e, "Status display update failed");
        }
    }

    fn abort_fetch(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
    }
}
