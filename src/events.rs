use crate::models::QueueState;

// Events pushed by the session facade to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    /// The remote player's status changed; query the facade for the new state.
    PlaybackStateChanged,
    QueueUpdated(QueueState),
    /// The app's own cast UI became visible (`true`) or hidden (`false`).
    UiVisibilityChanged(bool),
    ApplicationDisconnected(i32),
}

impl SessionEvent {
    // Get the name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Connected => "connected",
            SessionEvent::Disconnected => "disconnected",
            SessionEvent::PlaybackStateChanged => "playbackStateChanged",
            SessionEvent::QueueUpdated(_) => "queueUpdated",
            SessionEvent::UiVisibilityChanged(_) => "uiVisibilityChanged",
            SessionEvent::ApplicationDisconnected(_) => "applicationDisconnected",
        }
    }

    /// Events after which the status display must be torn down.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Disconnected | SessionEvent::ApplicationDisconnected(_)
        )
    }
}
