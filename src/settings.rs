use once_cell::sync::Lazy;
use std::{path::PathBuf, time::Duration};

use crate::actions::ActionKind;
use crate::display::IdlePolicy;
use crate::models::NetworkClass;
use crate::utils::env_parse::{
    parse_i32, parse_list, parse_secs, parse_string, parse_u32, parse_usize,
};

/// Holds all tunables, read-once from ENV with fallbacks.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Host job id routed back to the reconnect probe
    pub reconnect_job_id: i32,
    /// Host job id routed back to the expiry task
    pub clear_job_id: i32,
    pub reconnect_window: Duration,
    /// Remaining-time estimate for live streams and failed queries
    pub live_stream_fallback: Duration,
    pub network_recheck_interval: Duration,
    pub required_network: NetworkClass,
    pub idle_policy: IdlePolicy,
    pub artwork_size_px: u32,
    pub forward_step: Duration,
    pub display_actions: Vec<ActionKind>,
    pub compact_actions: Vec<usize>,
    pub event_buffer_capacity: usize,
    pub store_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            reconnect_job_id: 1,
            clear_job_id: 2,
            reconnect_window: Duration::from_secs(15),
            live_stream_fallback: Duration::from_secs(3 * 60),
            network_recheck_interval: Duration::from_secs(60),
            required_network: NetworkClass::Unmetered,
            idle_policy: IdlePolicy::ResetToIdle,
            artwork_size_px: 128,
            forward_step: Duration::from_secs(30),
            display_actions: vec![ActionKind::PlayPause, ActionKind::Disconnect],
            compact_actions: vec![0, 1],
            event_buffer_capacity: 64,
            store_path: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        // optionally load .env
        let _ = dotenvy::dotenv();

        let defaults = Settings::default();

        let required_network = match parse_string("REQUIRED_NETWORK").as_deref() {
            Some("any") => NetworkClass::Any,
            Some("unmetered") | None => defaults.required_network,
            Some(other) => {
                tracing::warn!(value = other, "Unknown REQUIRED_NETWORK, using unmetered");
                defaults.required_network
            }
        };

        let idle_policy = match parse_string("DISPLAY_IDLE_POLICY").as_deref() {
            Some("remove") => IdlePolicy::RemoveOnHide,
            Some("reset") | None => defaults.idle_policy,
            Some(other) => {
                tracing::warn!(value = other, "Unknown DISPLAY_IDLE_POLICY, using reset");
                defaults.idle_policy
            }
        };

        let display_actions = parse_string("DISPLAY_ACTIONS")
            .map(|raw| {
                parse_list(&raw)
                    .iter()
                    .filter_map(|name| {
                        let kind = ActionKind::parse(name);
                        if kind.is_none() {
                            tracing::warn!(action = %name, "Ignoring unknown display action");
                        }
                        kind
                    })
                    .collect()
            })
            .unwrap_or(defaults.display_actions);

        let compact_actions = parse_string("DISPLAY_COMPACT_ACTIONS")
            .map(|raw| {
                parse_list(&raw)
                    .iter()
                    .filter_map(|idx| idx.parse().ok())
                    .collect()
            })
            .unwrap_or(defaults.compact_actions);

        Settings {
            reconnect_job_id: parse_i32("RECONNECT_JOB_ID", defaults.reconnect_job_id),
            clear_job_id: parse_i32("CLEAR_JOB_ID", defaults.clear_job_id),
            reconnect_window: parse_secs("RECONNECT_WINDOW_SECS", 15),
            live_stream_fallback: parse_secs("LIVE_STREAM_FALLBACK_SECS", 3 * 60),
            network_recheck_interval: parse_secs("NETWORK_RECHECK_SECS", 60),
            required_network,
            idle_policy,
            artwork_size_px: parse_u32("ARTWORK_SIZE_PX", defaults.artwork_size_px),
            forward_step: parse_secs("FORWARD_STEP_SECS", 30),
            display_actions,
            compact_actions,
            event_buffer_capacity: parse_usize(
                "EVENT_BUFFER_CAPACITY",
                defaults.event_buffer_capacity,
            ),
            store_path: parse_string("KEEPER_STORE_PATH").map(PathBuf::from),
        }
    }
}

/// Global settings instance
pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);
