use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the receiver streams the media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    None,
    Buffered,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Artwork URLs, best first
    #[serde(default)]
    pub images: Vec<String>,
}

impl MediaMetadata {
    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn first_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Media currently loaded on the receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub content_id: String,
    pub stream_type: StreamType,
    #[serde(default)]
    pub metadata: MediaMetadata,
    /// Total length, `None` for live or unknown
    #[serde(default)]
    pub duration: Option<Duration>,
}

impl MediaInfo {
    pub fn is_live(&self) -> bool {
        self.stream_type == StreamType::Live
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub item_id: u32,
    pub media: Option<MediaInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    Off,
    All,
    Single,
    AllAndShuffle,
}

/// Snapshot of the receiver's queue as delivered with a queue update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    pub items: Vec<QueueItem>,
    pub current_item: Option<QueueItem>,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
}

impl QueueState {
    /// Index of the current item, `None` when it is not part of `items`.
    pub fn current_position(&self) -> Option<usize> {
        let current = self.current_item.as_ref()?;
        self.items
            .iter()
            .position(|item| item.item_id == current.item_id)
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }
}

/// Decoded artwork bitmap handed to the display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub url: String,
    pub size_px: u32,
    pub data: Bytes,
}

/// Network class a reconnect trigger waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkClass {
    Any,
    Unmetered,
}

/// What the host currently knows about connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub reachable: bool,
    /// Identity of the joined network (an SSID on Wi-Fi)
    pub network_key: Option<String>,
    pub metered: bool,
}

impl NetworkStatus {
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn wifi(ssid: &str) -> Self {
        Self {
            reachable: true,
            network_key: Some(ssid.to_string()),
            metered: false,
        }
    }

    pub fn satisfies(&self, class: NetworkClass) -> bool {
        match class {
            NetworkClass::Any => self.reachable,
            NetworkClass::Unmetered => self.reachable && !self.metered,
        }
    }

    /// The connectivity signal persisted as `wifiStatus`.
    pub fn has_network_identity(&self) -> bool {
        self.network_key.is_some()
    }
}
