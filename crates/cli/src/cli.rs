use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use wpbuild_core::{Environment, Orchestrator, ResolvedConfig};

use crate::logging::Logging;

#[derive(Parser, Debug)]
#[command(name = "wpbuild")]
#[command(version, about = "Build, watch and package WordPress plugin assets", long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging (ignored when --log-level is given)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration overlay to use (wpbuild.<name>.json)
    #[arg(long, global = true, value_name = "NAME")]
    pub variant: Option<String>,

    /// Project root containing wpbuild.json
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Log filter, e.g. "debug" or "wpbuild_core=trace"
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run a one-shot build (default)
    Build,

    /// Build, then rebuild on change until Ctrl+C
    Dev,
}

impl Cli {
    /// The subcommand to run; no subcommand means `build`
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Build)
    }

    fn default_environment(&self) -> Environment {
        match self.command() {
            Commands::Build => Environment::Production,
            Commands::Dev => Environment::Development,
        }
    }

    fn resolve(&self, orchestrator: &Orchestrator) -> Result<ResolvedConfig> {
        let name = self
            .variant
            .as_deref()
            .unwrap_or(self.default_environment().as_str());
        orchestrator
            .resolve(self.variant.as_deref(), self.default_environment())
            .with_context(|| {
                format!(
                    "failed to load '{}' configuration from {}",
                    name,
                    self.root.display()
                )
            })
    }

    pub async fn execute(self, logging: &Logging) -> Result<()> {
        let orchestrator = Orchestrator::new(&self.root);
        let config = self.resolve(&orchestrator)?;
        logging.apply_config_level(config.log_level.as_deref())?;

        match self.command() {
            Commands::Build => {
                let summary = orchestrator.build_with(&config).await.context("build failed")?;
                info!("Wrote {} script file(s)", summary.scripts.len());
                if let Some(archive) = summary.archive {
                    info!("Archive: {}", archive.display());
                }
            }
            Commands::Dev => {
                orchestrator
                    .dev_with(config, wait_for_interrupt(tokio::signal::ctrl_c()))
                    .await
                    .context("development session failed")?;
            }
        }
        Ok(())
    }
}

/// Completes once `signal` fires. A handler that cannot be installed is
/// reported and ends the session right away.
async fn wait_for_interrupt<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Could not listen for Ctrl+C ({}); stopping the development session", e);
    }
}
