use futures::future::{self, BoxFuture, FutureExt};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

use crate::error::KeeperError;
use crate::events::SessionEvent;
use crate::models::{MediaInfo, NetworkStatus, QueueState};
use crate::utils::{IdleReason, PlaybackStatus};

/// The live casting session as seen by this crate. Implemented by the host on
/// top of whatever protocol client actually talks to the device.
///
/// Queries that may hit the network return boxed futures so the trait stays
/// object safe; they fail with [`KeeperError::TransientDisconnection`] or
/// [`KeeperError::NoConnection`] when the device cannot be reached.
pub trait SessionFacade: Send + Sync {
    fn is_connected(&self) -> bool;

    fn is_connecting(&self) -> bool;

    /// Try to rejoin the last session within `window`. `network_key` names the
    /// network the session was created on, when known.
    fn reconnect_if_possible(
        &self,
        window: Duration,
        network_key: Option<String>,
    ) -> BoxFuture<'static, Result<(), KeeperError>>;

    fn remaining_play_time(&self) -> BoxFuture<'static, Result<Duration, KeeperError>>;

    fn is_live_stream(&self) -> BoxFuture<'static, Result<bool, KeeperError>>;

    fn current_playback_state(&self) -> PlaybackStatus;

    fn idle_reason(&self) -> IdleReason;

    /// Host policy: should the remote UI stay up for this idle state?
    fn should_remote_ui_be_visible(&self, state: PlaybackStatus, reason: IdleReason) -> bool;

    fn current_media_info(&self) -> BoxFuture<'static, Result<Option<MediaInfo>, KeeperError>>;

    fn queue_state(&self) -> Option<QueueState>;

    fn device_name(&self) -> String;

    /// Forget the media session the facade keeps for the last cast.
    fn clear_media_session(&self);

    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// Source of network reachability.
pub trait NetworkMonitor: Send + Sync {
    /// Current status; may need to ask the OS.
    fn probe(&self) -> BoxFuture<'static, NetworkStatus>;

    /// Change feed used to satisfy network triggers.
    fn subscribe(&self) -> watch::Receiver<NetworkStatus>;
}

/// Network monitor fed by the host through a watch channel.
pub struct WatchNetworkMonitor {
    tx: watch::Sender<NetworkStatus>,
}

impl WatchNetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new status; subscribers only wake when it actually changed.
    pub fn update(&self, status: NetworkStatus) {
        self.tx.send_if_modified(|prev| {
            if *prev != status {
                *prev = status;
                true
            } else {
                false
            }
        });
    }

    pub fn current(&self) -> NetworkStatus {
        self.tx.borrow().clone()
    }
}

impl NetworkMonitor for WatchNetworkMonitor {
    fn probe(&self) -> BoxFuture<'static, NetworkStatus> {
        future::ready(self.current()).boxed()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }
}
