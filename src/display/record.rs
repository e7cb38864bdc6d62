use tracing::{debug, trace};

use super::{casting_to, DisplayConfig, DisplayContent, IdlePolicy, VisibilityMode};
use crate::actions::ButtonContext;
use crate::models::{Artwork, MediaInfo};
use crate::utils::{HasPlaybackState, PlaybackStatus};

/// Identifies one artwork request. Only the most recently minted token is
/// honoured when results come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtworkToken(pub u64);

/// Inputs to the status state machine, already enriched with whatever the
/// facade had to be asked.
#[derive(Debug, Clone)]
pub enum StatusInput {
    /// The display task came up.
    Started,
    PlaybackChanged {
        state: PlaybackStatus,
        media: Option<MediaInfo>,
        /// Host policy verdict for an idle player; ignored for other states
        keep_visible_when_idle: bool,
    },
    QueueUpdated {
        position: Option<usize>,
        size: usize,
    },
    VisibilityChanged {
        display_visible: bool,
        /// Current media, needed only when no content has been built yet
        media: Option<MediaInfo>,
    },
    ArtworkLoaded {
        token: ArtworkToken,
        artwork: Artwork,
    },
    ArtworkFailed {
        token: ArtworkToken,
    },
    Teardown,
}

/// What the coordinator must do to the outside world after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Render(DisplayContent),
    Promote(DisplayContent),
    Demote(Option<DisplayContent>),
    Clear,
    FetchArtwork {
        token: ArtworkToken,
        url: String,
        size_px: u32,
    },
    CancelArtwork,
}

/// The single status record behind the display.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    config: DisplayConfig,
    device_name: String,
    media_info: Option<MediaInfo>,
    playback_state: PlaybackStatus,
    last_rendered_state: Option<PlaybackStatus>,
    is_playing: bool,
    has_next: bool,
    has_prev: bool,
    visibility: VisibilityMode,
    artwork_token: Option<ArtworkToken>,
    next_token: u64,
    last_artwork: Option<Artwork>,
    content: Option<DisplayContent>,
    /// True while the surface is absent or showing the idle template
    surface_idle: bool,
    /// Set once the remote player went idle or unknown; cleared by the next media state
    playback_cleared: bool,
    torn_down: bool,
}

impl StatusRecord {
    pub fn new(config: DisplayConfig, device_name: impl Into<String>) -> Self {
        Self {
            config,
            device_name: device_name.into(),
            media_info: None,
            playback_state: PlaybackStatus::Unknown,
            last_rendered_state: None,
            is_playing: false,
            has_next: false,
            has_prev: false,
            visibility: VisibilityMode::Hidden,
            artwork_token: None,
            next_token: 0,
            last_artwork: None,
            content: None,
            surface_idle: true,
            playback_cleared: false,
            torn_down: false,
        }
    }

    pub fn media_info(&self) -> Option<&MediaInfo> {
        self.media_info.as_ref()
    }

    pub fn playback_state(&self) -> PlaybackStatus {
        self.playback_state
    }

    pub fn last_rendered_state(&self) -> Option<PlaybackStatus> {
        self.last_rendered_state
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_prev(&self) -> bool {
        self.has_prev
    }

    pub fn visibility(&self) -> VisibilityMode {
        self.visibility
    }

    pub fn artwork_token(&self) -> Option<ArtworkToken> {
        self.artwork_token
    }

    pub fn content(&self) -> Option<&DisplayContent> {
        self.content.as_ref()
    }

    pub fn is_surface_idle(&self) -> bool {
        self.surface_idle
    }

    /// True when the remote player has nothing to show.
    pub fn is_playback_cleared(&self) -> bool {
        self.playback_cleared
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// A status equal to the last one acted upon changes nothing.
    pub fn is_duplicate(&self, state: PlaybackStatus) -> bool {
        self.last_rendered_state == Some(state)
    }

    /// Advance the state machine by one input.
    pub fn apply(&mut self, input: StatusInput) -> Vec<Effect> {
        if self.torn_down {
            trace!(?input, "Ignoring input after teardown");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match input {
            StatusInput::Started => {
                if self.config.idle_policy == IdlePolicy::ResetToIdle {
                    // The surface lives for the whole session under this policy
                    effects.push(Effect::Promote(self.idle_template()));
                }
            }
            StatusInput::PlaybackChanged {
                state,
                media,
                keep_visible_when_idle,
            } => self.on_playback_changed(state, media, keep_visible_when_idle, &mut effects),
            StatusInput::QueueUpdated { position, size } => {
                (self.has_next, self.has_prev) = match position {
                    Some(position) => (position + 1 < size, position > 0),
                    None => (false, false),
                };
                trace!(has_next = self.has_next, has_prev = self.has_prev, "Queue position updated");
            }
            StatusInput::VisibilityChanged {
                display_visible,
                media,
            } => self.on_visibility_changed(display_visible, media, &mut effects),
            StatusInput::ArtworkLoaded { token, artwork } => {
                self.on_artwork(token, Some(artwork), &mut effects)
            }
            StatusInput::ArtworkFailed { token } => self.on_artwork(token, None, &mut effects),
            StatusInput::Teardown => {
                self.invalidate_artwork(&mut effects);
                effects.push(Effect::Clear);
                self.content = None;
                self.media_info = None;
                self.last_rendered_state = None;
                self.surface_idle = true;
                self.torn_down = true;
                debug!("Status display torn down");
            }
        }
        effects
    }

    fn on_playback_changed(
        &mut self,
        state: PlaybackStatus,
        media: Option<MediaInfo>,
        keep_visible_when_idle: bool,
        effects: &mut Vec<Effect>,
    ) {
        if self.is_duplicate(state) {
            trace!(%state, "Playback status unchanged, nothing to do");
            return;
        }
        debug!(%state, previous = ?self.last_rendered_state, "Playback status changed");
        self.last_rendered_state = Some(state);
        self.playback_state = state;
        self.is_playing = state.is_playing();
        // Whatever was in flight describes an older state
        self.invalidate_artwork(effects);

        match state {
            PlaybackStatus::Buffering | PlaybackStatus::Playing | PlaybackStatus::Paused => {
                self.playback_cleared = false;
                if self.set_up_content(media, effects) {
                    self.present(effects);
                }
            }
            PlaybackStatus::Idle if keep_visible_when_idle => {
                self.playback_cleared = false;
                if self.set_up_content(media, effects) {
                    self.present(effects);
                }
            }
            PlaybackStatus::Idle | PlaybackStatus::Unknown => {
                // Old media must not come back on a later show
                self.playback_cleared = true;
                self.content = None;
                self.media_info = None;
                self.go_idle(effects);
            }
        }
    }

    fn on_visibility_changed(
        &mut self,
        display_visible: bool,
        media: Option<MediaInfo>,
        effects: &mut Vec<Effect>,
    ) {
        let mode = if display_visible {
            VisibilityMode::Shown
        } else {
            VisibilityMode::Hidden
        };
        if mode == self.visibility {
            trace!(?mode, "Visibility unchanged");
            return;
        }
        debug!(?mode, "Status display visibility changed");
        self.visibility = mode;

        if self.playback_cleared {
            self.go_idle(effects);
            return;
        }
        if self.content.is_none() && self.artwork_token.is_none() {
            self.set_up_content(media, effects);
        }
        if mode == VisibilityMode::Shown && self.content.is_some() {
            self.present(effects);
        } else {
            self.go_idle(effects);
        }
    }

    fn on_artwork(
        &mut self,
        token: ArtworkToken,
        artwork: Option<Artwork>,
        effects: &mut Vec<Effect>,
    ) {
        if self.artwork_token != Some(token) {
            debug!(?token, current = ?self.artwork_token, "Discarding stale artwork result");
            return;
        }
        self.artwork_token = None;
        let Some(media) = self.media_info.clone() else {
            return;
        };
        if artwork.is_some() {
            self.last_artwork = artwork.clone();
        }
        self.content = Some(self.build_content(&media, artwork));
        self.present(effects);
    }

    /// Builds content from `media`, or starts an artwork fetch that will.
    /// Returns true when content was rebuilt synchronously.
    fn set_up_content(&mut self, media: Option<MediaInfo>, effects: &mut Vec<Effect>) -> bool {
        let Some(media) = media else {
            debug!("No media information available, keeping current content");
            return false;
        };

        let url = media.metadata.first_image().map(str::to_string);
        self.media_info = Some(media.clone());

        match url {
            None => {
                self.content = Some(self.build_content(&media, None));
                true
            }
            Some(url) => {
                let cached = self
                    .last_artwork
                    .as_ref()
                    .filter(|artwork| artwork.url == url)
                    .cloned();
                if let Some(artwork) = cached {
                    trace!(%url, "Reusing artwork already fetched");
                    self.content = Some(self.build_content(&media, Some(artwork)));
                    return true;
                }
                let token = self.mint_token();
                effects.push(Effect::FetchArtwork {
                    token,
                    url,
                    size_px: self.config.artwork_size_px,
                });
                false
            }
        }
    }

    /// Shows the current content if the display is meant to be visible.
    fn present(&mut self, effects: &mut Vec<Effect>) {
        if self.visibility != VisibilityMode::Shown {
            return;
        }
        let Some(content) = self.content.clone() else {
            return;
        };
        if self.surface_idle {
            self.surface_idle = false;
            effects.push(Effect::Promote(content));
        } else {
            effects.push(Effect::Render(content));
        }
    }

    fn go_idle(&mut self, effects: &mut Vec<Effect>) {
        if self.surface_idle {
            return;
        }
        self.surface_idle = true;
        let template = match self.config.idle_policy {
            IdlePolicy::RemoveOnHide => None,
            IdlePolicy::ResetToIdle => Some(self.idle_template()),
        };
        effects.push(Effect::Demote(template));
    }

    fn mint_token(&mut self) -> ArtworkToken {
        self.next_token += 1;
        let token = ArtworkToken(self.next_token);
        self.artwork_token = Some(token);
        token
    }

    fn invalidate_artwork(&mut self, effects: &mut Vec<Effect>) {
        if self.artwork_token.take().is_some() {
            effects.push(Effect::CancelArtwork);
        }
    }

    fn idle_template(&self) -> DisplayContent {
        DisplayContent::idle_template(&self.device_name)
    }

    fn build_content(&self, media: &MediaInfo, artwork: Option<Artwork>) -> DisplayContent {
        let ctx = ButtonContext {
            is_playing: self.is_playing,
            is_live: media.is_live(),
            has_next: self.has_next,
            has_prev: self.has_prev,
        };
        let actions: Vec<_> = self
            .config
            .actions
            .iter()
            .map(|kind| kind.with_step(self.config.forward_step).to_button(ctx))
            .collect();
        let compact_actions = self
            .config
            .compact_actions
            .iter()
            .copied()
            .filter(|idx| *idx < actions.len())
            .collect();

        DisplayContent {
            title: media.metadata.title.clone().unwrap_or_default(),
            subtitle: casting_to(&self.device_name),
            artwork,
            is_playing: self.is_playing,
            is_live: media.is_live(),
            media_id: Some(media.content_id.clone()),
            actions,
            compact_actions,
        }
    }
}

impl HasPlaybackState for StatusRecord {
    fn status(&self) -> PlaybackStatus {
        self.playback_state
    }
}
