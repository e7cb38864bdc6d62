use serde::{Deserialize, Serialize};

/// Player state reported by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// No media status known yet
    Unknown,
    /// Player is idle, see `IdleReason`
    Idle,
    /// Media is playing
    Playing,
    /// Media is paused
    Paused,
    /// Media is buffering
    Buffering,
}

impl PlaybackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackStatus::Unknown => "UNKNOWN",
            PlaybackStatus::Idle => "IDLE",
            PlaybackStatus::Playing => "PLAYING",
            PlaybackStatus::Paused => "PAUSED",
            PlaybackStatus::Buffering => "BUFFERING",
        }
    }

    /// States whose display content is driven by the current media metadata.
    pub fn is_media_driven(self) -> bool {
        matches!(
            self,
            PlaybackStatus::Buffering | PlaybackStatus::Playing | PlaybackStatus::Paused
        )
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the player went idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdleReason {
    None,
    Finished,
    Cancelled,
    Interrupted,
    Error,
}

/// Trait for types that have a playback state
pub trait HasPlaybackState {
    /// Get the current playback state
    fn status(&self) -> PlaybackStatus;

    fn is_playing(&self) -> bool {
        self.status() == PlaybackStatus::Playing
    }

    fn is_paused(&self) -> bool {
        self.status() == PlaybackStatus::Paused
    }

    fn is_buffering(&self) -> bool {
        self.status() == PlaybackStatus::Buffering
    }

    fn is_idle(&self) -> bool {
        self.status() == PlaybackStatus::Idle
    }
}

impl HasPlaybackState for PlaybackStatus {
    fn status(&self) -> PlaybackStatus {
        *self
    }
}
