//! Development watch session
//!
//! One [`FileWatcher`] plus one [`Debouncer`] per asset kind. The kinds run
//! independently: a slow or failing rebuild of one never blocks another.

pub mod debounce;
pub mod watcher;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::compile::AssetKind;
use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::livereload::LiveReload;
use crate::paths::Paths;

pub use debounce::Debouncer;
pub use watcher::{FileWatcher, WatchSpec};

const SCRIPT_EXTENSIONS: [&str; 8] = ["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "json"];
const STYLE_EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

/// The watch specifications for a development session, in start order.
pub fn specs(config: &ResolvedConfig, is_dev: bool) -> Vec<WatchSpec> {
    let paths = Paths::new(config, is_dev);
    let library = paths.direct_library_path().to_path_buf();
    let destinations = paths.sync_destinations();
    let with_outputs_ignored = |mut spec: WatchSpec| {
        spec = spec.ignore(library.clone()).ignore(paths.dist_dir());
        for destination in &destinations {
            spec = spec.ignore(destination.clone());
        }
        spec
    };

    let mut script = WatchSpec::new(AssetKind::Script).extensions(&SCRIPT_EXTENSIONS);
    for entry in [&config.entry, &config.typescript.entry] {
        if let Some(dir) = entry.parent() {
            script = script.root(dir);
        }
    }

    let mut specs = vec![with_outputs_ignored(script)];

    if let Some(dir) = config.paths.styles.parent() {
        specs.push(with_outputs_ignored(
            WatchSpec::new(AssetKind::Style)
                .root(dir)
                .extensions(&STYLE_EXTENSIONS),
        ));
    }

    if config.features.translations {
        specs.push(with_outputs_ignored(
            WatchSpec::new(AssetKind::Translations)
                .root(&config.paths.wordpress_plugin)
                .extensions(&["php"])
                .ignore(config.paths.wordpress_plugin.join("vendor")),
        ));
    }

    if config.sync.composer {
        specs.push(
            WatchSpec::new(AssetKind::Composer)
                .root(&config.root)
                .non_recursive()
                .file_names(&["composer.json", "composer.lock"]),
        );
    }

    if !destinations.is_empty() {
        specs.push(with_outputs_ignored(
            WatchSpec::new(AssetKind::Files).root(&config.paths.wordpress_plugin),
        ));
    }

    specs
}

struct ActiveWatcher {
    watcher: FileWatcher,
    debouncer: Debouncer,
}

/// Live watchers plus the live-reload handle they notify
pub struct WatchSession {
    watchers: Vec<ActiveWatcher>,
    live_reload: Arc<dyn LiveReload>,
}

impl WatchSession {
    pub fn new(live_reload: Arc<dyn LiveReload>) -> Self {
        Self {
            watchers: Vec::new(),
            live_reload,
        }
    }

    /// Start watching `spec`, calling `rebuild` once per debounced burst.
    pub fn watch<F, Fut>(&mut self, spec: WatchSpec, debounce: Duration, rebuild: F) -> Result<()>
    where
        F: FnMut(Vec<PathBuf>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let debouncer = Debouncer::spawn(spec.kind, debounce, rebuild);
        let watcher = match FileWatcher::start(spec, debouncer.sender()) {
            Ok(watcher) => watcher,
            Err(e) => {
                tokio::spawn(debouncer.shutdown());
                return Err(e);
            }
        };
        self.watchers.push(ActiveWatcher { watcher, debouncer });
        Ok(())
    }

    pub fn kinds(&self) -> Vec<AssetKind> {
        self.watchers.iter().map(|w| w.watcher.kind()).collect()
    }

    /// Close every OS watcher, let in-flight rebuilds finish without
    /// scheduling new ones, then close the live-reload server.
    pub async fn shutdown(self) {
        let mut debouncers = Vec::with_capacity(self.watchers.len());
        for active in self.watchers {
            drop(active.watcher);
            debouncers.push(active.debouncer);
        }
        futures::future::join_all(debouncers.into_iter().map(Debouncer::shutdown)).await;
        self.live_reload.close();
        info!("Watch session closed");
    }
}
