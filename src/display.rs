//! Status display: the persistent surface that mirrors the remote player.
//!
//! [`record::StatusRecord`] holds the state machine and decides *what* the
//! surface should do; [`coordinator::StatusDisplayCoordinator`] feeds it
//! session events and carries out its decisions.

pub mod coordinator;
pub mod record;

use std::time::Duration;

use crate::actions::{ActionButton, ActionKind, ButtonContext, DisplayAction};
use crate::error::KeeperError;
use crate::models::Artwork;
use crate::settings::Settings;

/// What hiding the status display does to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdlePolicy {
    /// Take the surface down entirely; promoting brings it back.
    RemoveOnHide,
    /// Keep the surface up and swap in a neutral idle template.
    ResetToIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    Shown,
    Hidden,
}

/// Everything the surface needs to draw one state of the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayContent {
    pub title: String,
    pub subtitle: String,
    pub artwork: Option<Artwork>,
    pub is_playing: bool,
    pub is_live: bool,
    /// Content id of the media, `None` for the idle template
    pub media_id: Option<String>,
    pub actions: Vec<ActionButton>,
    /// Indices into `actions` shown in the compact layout
    pub compact_actions: Vec<usize>,
}

impl DisplayContent {
    /// Neutral content shown while there is nothing playing.
    pub fn idle_template(device_name: &str) -> Self {
        Self {
            title: "Waiting for media".to_string(),
            subtitle: casting_to(device_name),
            artwork: None,
            is_playing: false,
            is_live: false,
            media_id: None,
            actions: vec![DisplayAction::Disconnect.to_button(ButtonContext::default())],
            compact_actions: vec![0],
        }
    }

    pub fn is_idle_template(&self) -> bool {
        self.media_id.is_none()
    }

    pub fn action(&self, action: DisplayAction) -> Option<&ActionButton> {
        self.actions.iter().find(|button| button.action == action)
    }
}

pub(crate) fn casting_to(device_name: &str) -> String {
    format!("Casting to {}", device_name)
}

/// The rendering side, implemented by the host. Calls are made from the
/// coordinator's task only. Failures are logged by the caller and otherwise
/// ignored.
pub trait DisplaySurface: Send + Sync {
    /// Replace the content of an already active surface.
    fn render(&self, content: &DisplayContent) -> Result<(), KeeperError>;

    /// Remove the surface unconditionally.
    fn clear(&self) -> Result<(), KeeperError>;

    /// Bring the surface into the foreground-active mode showing `content`.
    fn promote_to_active(&self, content: &DisplayContent) -> Result<(), KeeperError>;

    /// Drop to idle mode. `None` removes the surface; a template keeps it up
    /// showing that template.
    fn demote_to_idle(&self, template: Option<DisplayContent>) -> Result<(), KeeperError>;
}

/// The slice of [`Settings`] that shapes display content.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub idle_policy: IdlePolicy,
    pub actions: Vec<ActionKind>,
    pub compact_actions: Vec<usize>,
    pub forward_step: Duration,
    pub artwork_size_px: u32,
}

impl From<&Settings> for DisplayConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            idle_policy: settings.idle_policy,
            actions: settings.display_actions.clone(),
            compact_actions: settings.compact_actions.clone(),
            forward_step: settings.forward_step,
            artwork_size_px: settings.artwork_size_px,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}
