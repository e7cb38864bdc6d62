use std::time::Duration;

// Secondary controls attached to the status display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    Disconnect,
    PlayPause,
    SkipNext,
    SkipPrevious,
    Forward { step: Duration },
    Rewind { step: Duration },
}

/// Which actions a host wants on its status display, without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Disconnect,
    PlayPause,
    SkipNext,
    SkipPrevious,
    Forward,
    Rewind,
}

impl ActionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disconnect" | "stop" => Some(ActionKind::Disconnect),
            "play_pause" | "toggleplayback" => Some(ActionKind::PlayPause),
            "skip_next" | "playnext" => Some(ActionKind::SkipNext),
            "skip_previous" | "playprev" => Some(ActionKind::SkipPrevious),
            "forward" => Some(ActionKind::Forward),
            "rewind" => Some(ActionKind::Rewind),
            _ => None,
        }
    }

    pub fn with_step(self, step: Duration) -> DisplayAction {
        match self {
            ActionKind::Disconnect => DisplayAction::Disconnect,
            ActionKind::PlayPause => DisplayAction::PlayPause,
            ActionKind::SkipNext => DisplayAction::SkipNext,
            ActionKind::SkipPrevious => DisplayAction::SkipPrevious,
            ActionKind::Forward => DisplayAction::Forward { step },
            ActionKind::Rewind => DisplayAction::Rewind { step },
        }
    }
}

/// Glyph the surface should draw for an action button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionIcon {
    Disconnect,
    Play,
    Pause,
    Stop,
    SkipNext,
    SkipPrevious,
    Forward,
    Forward10,
    Forward30,
    Rewind,
    Rewind10,
    Rewind30,
}

/// A resolved action button: what it does, how it looks, whether it is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub action: DisplayAction,
    pub icon: ActionIcon,
    pub label: &'static str,
    pub enabled: bool,
}

// Stable name the host routes a pressed button by
pub fn get_action_name(action: &DisplayAction) -> &'static str {
    match action {
        DisplayAction::Disconnect => "stop",
        DisplayAction::PlayPause => "toggleplayback",
        DisplayAction::SkipNext => "playnext",
        DisplayAction::SkipPrevious => "playprev",
        DisplayAction::Forward { .. } => "forward",
        DisplayAction::Rewind { .. } => "rewind",
    }
}

const TEN_SECONDS: Duration = Duration::from_secs(10);
const THIRTY_SECONDS: Duration = Duration::from_secs(30);

/// Flags that decide how buttons are resolved for one render.
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonContext {
    pub is_playing: bool,
    pub is_live: bool,
    pub has_next: bool,
    pub has_prev: bool,
}

impl DisplayAction {
    pub fn to_button(self, ctx: ButtonContext) -> ActionButton {
        match self {
            DisplayAction::Disconnect => ActionButton {
                action: self,
                icon: ActionIcon::Disconnect,
                label: "Disconnect",
                enabled: true,
            },
            DisplayAction::PlayPause => {
                let pause_or_stop = if ctx.is_live {
                    ActionIcon::Stop
                } else {
                    ActionIcon::Pause
                };
                ActionButton {
                    action: self,
                    icon: if ctx.is_playing {
                        pause_or_stop
                    } else {
                        ActionIcon::Play
                    },
                    label: if ctx.is_playing { "Pause" } else { "Play" },
                    enabled: true,
                }
            }
            // At the ends of the queue the button stays but is dimmed
            DisplayAction::SkipNext => ActionButton {
                action: self,
                icon: ActionIcon::SkipNext,
                label: "Skip next",
                enabled: ctx.has_next,
            },
            DisplayAction::SkipPrevious => ActionButton {
                action: self,
                icon: ActionIcon::SkipPrevious,
                label: "Skip previous",
                enabled: ctx.has_prev,
            },
            DisplayAction::Forward { step } => ActionButton {
                action: self,
                icon: if step == TEN_SECONDS {
                    ActionIcon::Forward10
                } else if step == THIRTY_SECONDS {
                    ActionIcon::Forward30
                } else {
                    ActionIcon::Forward
                },
                label: "Forward",
                enabled: true,
            },
            DisplayAction::Rewind { step } => ActionButton {
                action: self,
                icon: if step == TEN_SECONDS {
                    ActionIcon::Rewind10
                } else if step == THIRTY_SECONDS {
                    ActionIcon::Rewind30
                } else {
                    ActionIcon::Rewind
                },
                label: "Rewind",
                enabled: true,
            },
        }
    }
}
