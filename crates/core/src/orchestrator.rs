//! Build orchestration
//!
//! Sequences the components for a one-shot build or a development session.
//! Nothing is shared between invocations: each call resolves its own
//! configuration and builds its own compilers.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::clean::Cleaner;
use crate::compile::{
    AssetKind, Bundler, CatalogGenerator, CatalogOutcome, EsbuildBundler, SassEngine,
    ScriptCompiler, StyleCompiler, StyleEngine, TranslationCompiler, WpCliCatalogGenerator,
};
use crate::config::{ConfigResolver, Environment, ResolvedConfig};
use crate::error::Result;
use crate::livereload::{LiveReload, LiveReloadServer, NoopLiveReload};
use crate::metadata::MetadataRewriter;
use crate::package::Packager;
use crate::paths::Paths;
use crate::sync::{SyncReport, Synchronizer};
use crate::watch::{self, WatchSession};

/// The external compilers a build drives
#[derive(Clone)]
pub struct Toolchain {
    pub bundler: Arc<dyn Bundler>,
    pub styles: Arc<dyn StyleEngine>,
    pub catalogs: Arc<dyn CatalogGenerator>,
}

impl Toolchain {
    /// esbuild, sass and wp-cli as configured under `tools`
    pub fn system(config: &ResolvedConfig) -> Self {
        Self {
            bundler: Arc::new(EsbuildBundler::new(&config.tools.esbuild, &config.root)),
            styles: Arc::new(SassEngine::new(&config.tools.sass)),
            catalogs: Arc::new(WpCliCatalogGenerator::new(&config.tools.wp, &config.root)),
        }
    }
}

/// What a one-shot build produced
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub scripts: Vec<PathBuf>,
    pub stylesheet: PathBuf,
    pub catalog: CatalogOutcome,
    pub sync: SyncReport,
    pub archive: Option<PathBuf>,
}

pub struct Orchestrator {
    root: PathBuf,
    toolchain: Option<Toolchain>,
}

impl Orchestrator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            toolchain: None,
        }
    }

    /// Use these compilers instead of the configured command line tools
    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    /// Resolve `variant`, or the canonical environment when none is given.
    pub fn resolve(&self, variant: Option<&str>, default: Environment) -> Result<ResolvedConfig> {
        ConfigResolver::resolve(&self.root, variant.unwrap_or(default.as_str()))
    }

    fn toolchain_for(&self, config: &ResolvedConfig) -> Toolchain {
        self.toolchain
            .clone()
            .unwrap_or_else(|| Toolchain::system(config))
    }

    pub async fn build(&self, variant: Option<&str>) -> Result<BuildSummary> {
        let config = self.resolve(variant, Environment::Production)?;
        self.build_with(&config).await
    }

    /// One-shot build. The first failing stage aborts the rest.
    pub async fn build_with(&self, config: &ResolvedConfig) -> Result<BuildSummary> {
        let is_dev = config.is_development();
        let paths = Paths::new(config, is_dev);
        let tools = self.toolchain_for(config);
        info!(
            "Building {} v{} ({})",
            config.name,
            config.version,
            config.variant.as_deref().unwrap_or(config.environment.as_str())
        );

        Cleaner::ensure_directories(config, is_dev);
        Cleaner::clean(config, is_dev);

        if paths.should_create_dist() {
            MetadataRewriter::rewrite(config, &config.paths.wordpress_plugin)?;
        }

        let scripts = ScriptCompiler::new(tools.bundler).compile(config, is_dev).await?;
        let stylesheet = StyleCompiler::new(tools.styles).compile(config, is_dev).await?;
        let catalog = TranslationCompiler::new(tools.catalogs).compile(config).await?;
        let sync = Synchronizer::sync(config, is_dev).await?;

        let archive = if paths.should_create_dist() {
            Some(Packager::archive(config)?)
        } else {
            Cleaner::remove_stale_dist(config, is_dev);
            None
        };

        info!("Build finished");
        Ok(BuildSummary {
            scripts,
            stylesheet,
            catalog,
            sync,
            archive,
        })
    }

    pub async fn dev<S>(&self, variant: Option<&str>, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let config = self.resolve(variant, Environment::Development)?;
        self.dev_with(config, shutdown).await
    }

    /// Development session: initial build, then watch until `shutdown`
    /// completes. Rebuild failures are logged and the session continues.
    pub async fn dev_with<S>(&self, config: ResolvedConfig, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let is_dev = true;
        let paths = Paths::new(&config, is_dev);
        info!(
            "Starting development session for {} ({})",
            config.name,
            config.variant.as_deref().unwrap_or(config.environment.as_str())
        );

        Cleaner::ensure_directories(&config, is_dev);
        Cleaner::clean(&config, is_dev);
        if config.wordpress.dev_target.is_some() {
            MetadataRewriter::rewrite(&config, &config.paths.wordpress_plugin)?;
        }

        let rebuilder = Rebuilder {
            config: Arc::new(config.clone()),
            tools: self.toolchain_for(&config),
            live_reload: start_live_reload(&config).await,
            sync_lock: Arc::new(Mutex::new(())),
        };

        for kind in [AssetKind::Script, AssetKind::Style, AssetKind::Translations] {
            rebuilder.compile(kind).await?;
        }
        Synchronizer::sync(&config, is_dev).await?;
        if !paths.should_create_dist() {
            Cleaner::remove_stale_dist(&config, is_dev);
        }

        let mut session = WatchSession::new(Arc::clone(&rebuilder.live_reload));
        for spec in watch::specs(&config, is_dev) {
            let kind = spec.kind;
            let rebuilder = rebuilder.clone();
            session.watch(spec, config.watch.debounce, move |changed| {
                let rebuilder = rebuilder.clone();
                async move { rebuilder.rebuild(kind, changed).await }
            })?;
        }
        info!("Watching for changes ({} watchers); press Ctrl+C to stop", session.kinds().len());

        shutdown.await;
        info!("Shutting down");
        session.shutdown().await;
        Ok(())
    }
}

async fn start_live_reload(config: &ResolvedConfig) -> Arc<dyn LiveReload> {
    if !config.features.live_reload {
        return Arc::new(NoopLiveReload);
    }
    match LiveReloadServer::bind(config.watch.live_reload_port).await {
        Ok(server) => Arc::new(server),
        Err(e) => {
            warn!("Live reload disabled: {}", e);
            Arc::new(NoopLiveReload)
        }
    }
}

/// Per-kind rebuild actions of a development session
#[derive(Clone)]
struct Rebuilder {
    config: Arc<ResolvedConfig>,
    tools: Toolchain,
    live_reload: Arc<dyn LiveReload>,
    /// Watchers of different kinds may fire for one change; their syncs
    /// write the same destinations and must not overlap.
    sync_lock: Arc<Mutex<()>>,
}

impl Rebuilder {
    /// Compile one asset kind. Compile errors are logged and swallowed;
    /// anything else is returned. Yields the output to reload, if any.
    async fn compile(&self, kind: AssetKind) -> Result<Option<PathBuf>> {
        let config = self.config.as_ref();
        let result = match kind {
            AssetKind::Script => ScriptCompiler::new(Arc::clone(&self.tools.bundler))
                .compile(config, true)
                .await
                .map(|outputs| outputs.into_iter().next()),
            AssetKind::Style => StyleCompiler::new(Arc::clone(&self.tools.styles))
                .compile(config, true)
                .await
                .map(Some),
            AssetKind::Translations => TranslationCompiler::new(Arc::clone(&self.tools.catalogs))
                .compile(config)
                .await
                .map(|_| None),
            AssetKind::Composer | AssetKind::Files => Ok(None),
        };

        match result {
            Err(e) if !e.is_fatal_for_watch() => {
                error!("[{}] {}; keeping previous output", kind, e);
                Ok(None)
            }
            other => other,
        }
    }

    async fn rebuild(&self, kind: AssetKind, changed: Vec<PathBuf>) {
        debug!("[{}] {} file(s) changed", kind, changed.len());
        if let Err(e) = self.try_rebuild(kind, &changed).await {
            error!("[{}] rebuild failed: {}", kind, e);
        }
    }

    async fn try_rebuild(&self, kind: AssetKind, changed: &[PathBuf]) -> Result<()> {
        let output = self.compile(kind).await?;
        let report = {
            let _guard = self.sync_lock.lock().await;
            Synchronizer::sync(&self.config, true).await?
        };

        let reload = match kind {
            AssetKind::Script | AssetKind::Style => output,
            AssetKind::Files => changed.first().cloned(),
            AssetKind::Translations | AssetKind::Composer => None,
        };
        if let Some(path) = reload {
            self.live_reload.notify_change(&path);
        }
        info!("[{}] rebuilt ({} file(s) synchronized)", kind, report.copied);
        Ok(())
    }
}
