/// Helpers for turning raw environment strings into typed settings.
/// Every helper falls back to the supplied default when the variable is
/// missing or malformed.
pub mod env_parse {
    use std::env;
    use std::time::Duration;

    pub fn parse_usize(var: &str, default: usize) -> usize {
        env::var(var)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn parse_i32(var: &str, default: i32) -> i32 {
        env::var(var)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn parse_u32(var: &str, default: u32) -> u32 {
        env::var(var)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Seconds into a `Duration`
    pub fn parse_secs(var: &str, default_secs: u64) -> Duration {
        env::var(var)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(default_secs))
    }

    pub fn parse_string(var: &str) -> Option<String> {
        env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Comma-separated list, empty entries dropped
    pub fn parse_list(s: &str) -> Vec<String> {
        s.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
