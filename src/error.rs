use thiserror::Error;

// Errors surfaced by the keeper, its tasks and the status display
#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Session temporarily unreachable: {0}")]
    TransientDisconnection(String),

    #[error("No connection to the cast device")]
    NoConnection,

    /// Raised by a task body that observed its cancellation token.
    #[error("Task cancelled")]
    Cancelled,

    #[error("Status display coordinator has stopped")]
    CoordinatorStopped,

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Display surface failed: {0}")]
    Render(String),

    #[error("Preference store failed: {0}")]
    Store(String),

    #[error("Artwork fetch failed: {0}")]
    Artwork(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task panicked or was aborted")]
    TaskJoinError(#[from] tokio::task::JoinError),
}

impl KeeperError {
    /// Connectivity hiccups that a task body swallows and falls back from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            KeeperError::TransientDisconnection(_) | KeeperError::NoConnection
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, KeeperError::Cancelled)
    }
}
