//! Runtime tuning for the ticket engine.
//!
//! Everything here has a sensible default and can be overridden through
//! environment variables, following the other guichet binaries.

use std::time::Duration;

use tracing::warn;

/// Knobs for the background machinery of the ticket runtime.
///
/// Per-community behaviour (limits, auto-close thresholds, templates) lives
/// in [`guichet_store::GuildSettings`]; this struct only covers what is
/// process-wide.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How often the idle reaper sweeps all communities.
    /// Env: `GUICHET_SWEEP_INTERVAL_SECS`
    /// Default: 3600 (hourly)
    pub sweep_interval: Duration,

    /// Grace delay between closing a ticket and deleting its channel,
    /// so participants can read the closing notice.
    /// Env: `GUICHET_CLOSE_GRACE_SECS`
    /// Default: 10
    pub close_grace: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
            close_grace: Duration::from_secs(10),
        }
    }
}

impl RuntimeConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GUICHET_SWEEP_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.sweep_interval = Duration::from_secs(secs),
                _ => warn!(value = %val, "Invalid GUICHET_SWEEP_INTERVAL_SECS, using default"),
            }
        }

        if let Ok(val) = std::env::var("GUICHET_CLOSE_GRACE_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.close_grace = Duration::from_secs(secs),
                Err(_) => warn!(value = %val, "Invalid GUICHET_CLOSE_GRACE_SECS, using default"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.close_grace, Duration::from_secs(10));
    }
}
