use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::KeeperError;
use crate::facade::{NetworkMonitor, SessionFacade};
use crate::models::NetworkClass;
use crate::scheduler::{TaskContext, TaskOutcome, Trigger};
use crate::store::PersistedState;

/// Body of the reconnect task. Records whether a named network is joined,
/// kicks off a reconnection when the session dropped, and always re-arms
/// itself for the next network-available signal.
#[derive(Clone)]
pub(crate) struct ReconnectProbe {
    pub(crate) facade: Arc<dyn SessionFacade>,
    pub(crate) network: Arc<dyn NetworkMonitor>,
    pub(crate) persisted: PersistedState,
    pub(crate) window: Duration,
    pub(crate) required: NetworkClass,
}

impl ReconnectProbe {
    pub(crate) async fn run(self, ctx: TaskContext) -> Result<TaskOutcome, KeeperError> {
        let status = ctx.checkpoint(self.network.probe()).await?;
        let reachable = status.satisfies(self.required);

        ctx.ensure_active()?;
        if let Err(e) = self.persisted.set_wifi_status(status.has_network_identity()) {
            warn!(error = %e, "Failed to persist connectivity signal");
        }

        if reachable && !self.facade.is_connected() && !self.facade.is_connecting() {
            ctx.ensure_active()?;
            info!(
                network = status.network_key.as_deref().unwrap_or("<unknown>"),
                window = ?self.window,
                "Network available and session down, attempting reconnection"
            );
            // Detached: the probe does not wait on the attempt's outcome
            let attempt = self
                .facade
                .reconnect_if_possible(self.window, status.network_key.clone());
            tokio::spawn(async move {
                if let Err(e) = attempt.await {
                    warn!(error = %e, "Reconnection attempt failed");
                }
            });
        } else {
            debug!(
                reachable,
                connected = self.facade.is_connected(),
                connecting = self.facade.is_connecting(),
                "No reconnection needed"
            );
        }

        ctx.reschedule(Trigger::NetworkAvailable(self.required))
    }
}
