#![allow(dead_code)]

use bytes::Bytes;
use futures::future::{self, BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Notify};

use cast_keeper_rs::{
    Artwork, ArtworkLoader, DisplayContent, DisplaySurface, IdleReason, KeeperError, MediaInfo,
    MediaMetadata, MemoryStore, NetworkMonitor, NetworkStatus, PlaybackStatus, QueueItem,
    QueueState, RepeatMode, SessionEvent, SessionFacade, SessionKeeper, Settings, StreamType,
    WatchNetworkMonitor,
};

/// Polls `cond` every 10ms of (possibly paused) time, for at most 5s.
pub async fn wait_until<F: FnMut() -> bool>(mut cond: F) -> bool {
    for _ in 0..500 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

pub fn media(id: &str, title: &str, image: Option<&str>) -> MediaInfo {
    MediaInfo {
        content_id: id.to_string(),
        stream_type: StreamType::Buffered,
        metadata: MediaMetadata {
            title: Some(title.to_string()),
            subtitle: None,
            images: image.map(|url| vec![url.to_string()]).unwrap_or_default(),
        },
        duration: Some(Duration::from_secs(600)),
    }
}

pub fn live_media(id: &str, title: &str) -> MediaInfo {
    MediaInfo {
        stream_type: StreamType::Live,
        duration: None,
        ..media(id, title, None)
    }
}

/// Queue of `size` items positioned at `current`.
pub fn queue(size: u32, current: u32) -> QueueState {
    let items: Vec<_> = (0..size)
        .map(|item_id| QueueItem {
            item_id,
            media: None,
        })
        .collect();
    QueueState {
        current_item: items.get(current as usize).cloned(),
        items,
        repeat_mode: RepeatMode::Off,
        shuffle: false,
    }
}

/// Scriptable session facade that records what was asked of it.
pub struct FakeFacade {
    connected: AtomicBool,
    connecting: AtomicBool,
    /// `None` makes the query fail as a transient disconnection
    live: Mutex<Option<bool>>,
    remaining: Mutex<Option<Duration>>,
    state: Mutex<PlaybackStatus>,
    idle_reason: Mutex<IdleReason>,
    keep_ui_when_idle: AtomicBool,
    media: Mutex<Option<MediaInfo>>,
    media_fails: AtomicBool,
    media_queries: AtomicUsize,
    queue: Mutex<Option<QueueState>>,
    reconnects: Mutex<Vec<(Duration, Option<String>)>>,
    clears: AtomicUsize,
    events: Mutex<Option<broadcast::Sender<SessionEvent>>>,
}

impl FakeFacade {
    pub fn new(connected: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            connected: AtomicBool::new(connected),
            connecting: AtomicBool::new(false),
            live: Mutex::new(Some(false)),
            remaining: Mutex::new(Some(Duration::from_secs(240))),
            state: Mutex::new(PlaybackStatus::Unknown),
            idle_reason: Mutex::new(IdleReason::None),
            keep_ui_when_idle: AtomicBool::new(false),
            media: Mutex::new(None),
            media_fails: AtomicBool::new(false),
            media_queries: AtomicUsize::new(0),
            queue: Mutex::new(None),
            reconnects: Mutex::new(Vec::new()),
            clears: AtomicUsize::new(0),
            events: Mutex::new(Some(events)),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_connecting(&self, connecting: bool) {
        self.connecting.store(connecting, Ordering::SeqCst);
    }

    pub fn set_live(&self, live: Option<bool>) {
        *self.live.lock().unwrap() = live;
    }

    pub fn set_remaining(&self, remaining: Option<Duration>) {
        *self.remaining.lock().unwrap() = remaining;
    }

    pub fn set_state(&self, state: PlaybackStatus) {
        *self.state.lock().unwrap() = state;
    }

    pub fn set_idle(&self, reason: IdleReason, keep_ui: bool) {
        *self.state.lock().unwrap() = PlaybackStatus::Idle;
        *self.idle_reason.lock().unwrap() = reason;
        self.keep_ui_when_idle.store(keep_ui, Ordering::SeqCst);
    }

    pub fn set_media(&self, media: Option<MediaInfo>) {
        *self.media.lock().unwrap() = media;
    }

    pub fn fail_media_queries(&self, fail: bool) {
        self.media_fails.store(fail, Ordering::SeqCst);
    }

    pub fn set_queue(&self, queue: Option<QueueState>) {
        *self.queue.lock().unwrap() = queue;
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Drops the event sender so every subscriber sees the stream close.
    pub fn close_events(&self) {
        self.events.lock().unwrap().take();
    }

    pub fn subscriber_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn reconnect_calls(&self) -> Vec<(Duration, Option<String>)> {
        self.reconnects.lock().unwrap().clone()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn media_query_count(&self) -> usize {
        self.media_queries.load(Ordering::SeqCst)
    }
}

impl SessionFacade for FakeFacade {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    fn reconnect_if_possible(
        &self,
        window: Duration,
        network_key: Option<String>,
    ) -> BoxFuture<'static, Result<(), KeeperError>> {
        self.reconnects.lock().unwrap().push((window, network_key));
        future::ready(Ok(())).boxed()
    }

    fn remaining_play_time(&self) -> BoxFuture<'static, Result<Duration, KeeperError>> {
        let remaining = *self.remaining.lock().unwrap();
        future::ready(remaining.ok_or_else(|| {
            KeeperError::TransientDisconnection("media status unavailable".to_string())
        }))
        .boxed()
    }

    fn is_live_stream(&self) -> BoxFuture<'static, Result<bool, KeeperError>> {
        let live = *self.live.lock().unwrap();
        future::ready(live.ok_or_else(|| {
            KeeperError::TransientDisconnection("media status unavailable".to_string())
        }))
        .boxed()
    }

    fn current_playback_state(&self) -> PlaybackStatus {
        *self.state.lock().unwrap()
    }

    fn idle_reason(&self) -> IdleReason {
        *self.idle_reason.lock().unwrap()
    }

    fn should_remote_ui_be_visible(&self, _state: PlaybackStatus, _reason: IdleReason) -> bool {
        self.keep_ui_when_idle.load(Ordering::SeqCst)
    }

    fn current_media_info(&self) -> BoxFuture<'static, Result<Option<MediaInfo>, KeeperError>> {
        self.media_queries.fetch_add(1, Ordering::SeqCst);
        let result = if self.media_fails.load(Ordering::SeqCst) {
            Err(KeeperError::NoConnection)
        } else {
            Ok(self.media.lock().unwrap().clone())
        };
        future::ready(result).boxed()
    }

    fn queue_state(&self) -> Option<QueueState> {
        self.queue.lock().unwrap().clone()
    }

    fn device_name(&self) -> String {
        "Living Room TV".to_string()
    }

    fn clear_media_session(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }
}

/// Network monitor whose probes can be held open.
pub struct TestNetwork {
    monitor: WatchNetworkMonitor,
    gate: Mutex<Option<Arc<Notify>>>,
    probes: AtomicUsize,
}

impl TestNetwork {
    pub fn new(initial: NetworkStatus) -> Arc<Self> {
        Arc::new(Self {
            monitor: WatchNetworkMonitor::new(initial),
            gate: Mutex::new(None),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, status: NetworkStatus) {
        self.monitor.update(status);
    }

    /// Every later probe waits until the returned gate is notified.
    pub fn hold_probes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl NetworkMonitor for TestNetwork {
    fn probe(&self) -> BoxFuture<'static, NetworkStatus> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        let rx: watch::Receiver<NetworkStatus> = self.monitor.subscribe();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let status = rx.borrow().clone();
            status
        }
        .boxed()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.monitor.subscribe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Render(DisplayContent),
    Clear,
    Promote(DisplayContent),
    Demote(Option<DisplayContent>),
}

#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SurfaceCall> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl DisplaySurface for RecordingSurface {
    fn render(&self, content: &DisplayContent) -> Result<(), KeeperError> {
        self.calls
            .lock()
            .unwrap()
            .push(SurfaceCall::Render(content.clone()));
        Ok(())
    }

    fn clear(&self) -> Result<(), KeeperError> {
        self.calls.lock().unwrap().push(SurfaceCall::Clear);
        Ok(())
    }

    fn promote_to_active(&self, content: &DisplayContent) -> Result<(), KeeperError> {
        self.calls
            .lock()
            .unwrap()
            .push(SurfaceCall::Promote(content.clone()));
        Ok(())
    }

    fn demote_to_idle(&self, template: Option<DisplayContent>) -> Result<(), KeeperError> {
        self.calls
            .lock()
            .unwrap()
            .push(SurfaceCall::Demote(template));
        Ok(())
    }
}

/// Artwork loader with per-URL gates and failures.
#[derive(Default)]
pub struct FakeArtwork {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing: Mutex<HashSet<String>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeArtwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fetches of `url` block until the returned gate is notified.
    pub fn hold(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(url.to_string(), gate.clone());
        gate
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

impl ArtworkLoader for FakeArtwork {
    fn fetch(&self, url: &str, size_px: u32) -> BoxFuture<'static, Result<Artwork, KeeperError>> {
        self.fetches.lock().unwrap().push(url.to_string());
        let gate = self.gates.lock().unwrap().get(url).cloned();
        let fails = self.failing.lock().unwrap().contains(url);
        let url = url.to_string();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if fails {
                return Err(KeeperError::Artwork(format!("{} unavailable", url)));
            }
            Ok(Artwork {
                url,
                size_px,
                data: Bytes::from_static(b"\x89PNG"),
            })
        }
        .boxed()
    }
}

pub fn keeper(
    facade: Arc<FakeFacade>,
    network: Arc<TestNetwork>,
    store: Arc<MemoryStore>,
) -> SessionKeeper {
    keeper_with(facade, network, store, Settings::default())
}

pub fn keeper_with(
    facade: Arc<FakeFacade>,
    network: Arc<TestNetwork>,
    store: Arc<MemoryStore>,
    settings: Settings,
) -> SessionKeeper {
    SessionKeeper::builder()
        .facade(facade)
        .network(network)
        .store(store)
        .settings(settings)
        .build()
        .expect("keeper builds")
}
