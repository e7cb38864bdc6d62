use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

use crate::error::KeeperError;
use crate::facade::SessionFacade;
use crate::scheduler::{TaskContext, TaskOutcome, Trigger};
use crate::store::PersistedState;

/// Body of the expiry task. Fires once the media should have ended: a gone
/// session gets its persisted state wiped, a live one gets a fresh deadline.
#[derive(Clone)]
pub(crate) struct SessionExpiry {
    pub(crate) facade: Arc<dyn SessionFacade>,
    pub(crate) persisted: PersistedState,
    pub(crate) fallback: Duration,
}

impl SessionExpiry {
    pub(crate) async fn run(self, ctx: TaskContext) -> Result<TaskOutcome, KeeperError> {
        ctx.ensure_active()?;

        if !self.facade.is_connected() {
            info!("Session gone when media time ran out, clearing persisted session state");
            self.facade.clear_media_session();
            self.persisted.clear_all()?;
            return Ok(TaskOutcome::Finished);
        }

        // Still connected: the media may just have been paused, so start over
        // from what is actually left.
        let mut remaining =
            ctx.checkpoint(compute_remaining_time(self.facade.as_ref(), self.fallback)).await?;
        if remaining.is_zero() {
            debug!("Media reports no time left while connected, checking again after fallback");
            remaining = self.fallback;
        }

        ctx.ensure_active()?;
        if let Err(e) = self
            .persisted
            .set_media_end_deadline(SystemTime::now() + remaining)
        {
            warn!(error = %e, "Failed to persist media end deadline");
        }
        debug!(?remaining, "Resetting the expiry timer");
        ctx.reschedule(Trigger::Delay(remaining))
    }
}

/// Time until the current media ends. Live streams and failed queries yield
/// `fallback`; errors are logged here and never returned.
pub async fn compute_remaining_time(facade: &dyn SessionFacade, fallback: Duration) -> Duration {
    match facade.is_live_stream().await {
        Ok(true) => return fallback,
        Ok(false) => {}
        Err(e) => {
            log_remaining_failure(&e);
            return fallback;
        }
    }

    match facade.remaining_play_time().await {
        Ok(remaining) => remaining,
        Err(e) => {
            log_remaining_failure(&e);
            fallback
        }
    }
}

fn log_remaining_failure(e: &KeeperError) {
    if e.is_transient() {
        warn!(error = %e, "Failed to calculate the time left for media due to lack of connectivity");
    } else {
        error!(error = %e, "Failed to calculate the time left for media");
    }
}
