//! Logger setup
//!
//! The filter is chosen once at startup from `--log-level` or `RUST_LOG`.
//! When neither is given the logger starts at `info` and the project's
//! `logLevel` setting may replace it after the configuration is resolved.

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

const DEFAULT_LEVEL: &str = "info";

/// Pick the initial filter directive. The flag is `true` when the user chose
/// it explicitly, in which case the configuration must not override it.
pub fn initial_directive(cli_level: Option<&str>, env_level: Option<String>) -> (String, bool) {
    if let Some(level) = cli_level {
        return (level.to_string(), true);
    }
    match env_level {
        Some(level) if !level.trim().is_empty() => (level, true),
        _ => (DEFAULT_LEVEL.to_string(), false),
    }
}

pub struct Logging {
    handle: reload::Handle<EnvFilter, Registry>,
    explicit: bool,
}

impl Logging {
    /// Install the global subscriber
    pub fn init(cli_level: Option<&str>) -> Result<Self> {
        let (directive, explicit) =
            initial_directive(cli_level, std::env::var(EnvFilter::DEFAULT_ENV).ok());
        let filter = EnvFilter::try_new(&directive)
            .with_context(|| format!("invalid log level '{directive}'"))?;
        let (filter, handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .context("failed to install logger")?;

        Ok(Self { handle, explicit })
    }

    /// Apply the project's `logLevel` unless the user already picked one.
    pub fn apply_config_level(&self, level: Option<&str>) -> Result<()> {
        let Some(level) = level.filter(|_| !self.explicit) else {
            return Ok(());
        };
        let filter =
            EnvFilter::try_new(level).with_context(|| format!("invalid logLevel '{level}'"))?;
        self.handle
            .reload(filter)
            .context("failed to update log level")?;
        debug!("Log level set to {} from configuration", level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_over_env() {
        let (directive, explicit) = initial_directive(Some("debug"), Some("warn".into()));
        assert_eq!(directive, "debug");
        assert!(explicit);
    }

    #[test]
    fn test_env_used_without_flag() {
        let (directive, explicit) = initial_directive(None, Some("wpbuild_core=trace".into()));
        assert_eq!(directive, "wpbuild_core=trace");
        assert!(explicit);
    }

    #[test]
    fn test_default_can_be_overridden() {
        let (directive, explicit) = initial_directive(None, Some("  ".into()));
        assert_eq!(directive, "info");
        assert!(!explicit);

        let (directive, explicit) = initial_directive(None, None);
        assert_eq!(directive, "info");
        assert!(!explicit);
    }
}
