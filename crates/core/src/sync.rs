//! Artifact synchronization
//!
//! Copies the plugin tree, the compiled library, vendored dependencies and the
//! composer manifests into every destination the path deriver names. Files
//! whose destination already holds the same bytes are left alone, so running
//! a sync twice writes nothing the second time.

use futures::future::try_join_all;
use glob::Pattern;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ResolvedConfig;
use crate::error::{Error, Result};
use crate::fsutil::{copy_if_changed, is_hidden_name};
use crate::paths::Paths;

const COMPOSER_FILES: [&str; 2] = ["composer.json", "composer.lock"];

/// File counts from one or more sync tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub copied: usize,
    pub unchanged: usize,
    /// Entries rejected by the filter (hidden, excluded, or an excluded subtree)
    pub skipped: usize,
}

impl AddAssign for SyncReport {
    fn add_assign(&mut self, other: Self) {
        self.copied += other.copied;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
    }
}

/// Which entries of a task's source are copied
#[derive(Debug, Clone, Default)]
pub struct SyncFilter {
    exclude: Vec<Pattern>,
    /// Absolute directories never descended into
    subtrees: Vec<PathBuf>,
}

impl SyncFilter {
    /// Invalid patterns are reported and ignored.
    pub fn new(patterns: &[String]) -> Self {
        let exclude = patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid sync exclude pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();
        Self {
            exclude,
            subtrees: Vec::new(),
        }
    }

    pub fn skip_subtree(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if !self.subtrees.contains(&dir) {
            self.subtrees.push(dir);
        }
        self
    }

    /// Whether the entry at `path` (`relative` to the task source) is copied
    pub fn accepts(&self, path: &Path, relative: &Path) -> bool {
        if path.file_name().is_some_and(is_hidden_name) {
            return false;
        }
        if self.subtrees.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        !self.exclude.iter().any(|pattern| {
            pattern.matches_path(relative)
                || relative
                    .file_name()
                    .is_some_and(|name| pattern.matches(&name.to_string_lossy()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// The whole source directory
    Tree,
    /// Named files directly inside the source directory; missing ones are ignored
    Files(Vec<String>),
}

/// One source directory mirrored into one or more destinations
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub name: &'static str,
    pub source: PathBuf,
    pub destinations: Vec<PathBuf>,
    pub filter: SyncFilter,
    pub mode: SyncMode,
}

impl SyncTask {
    /// Blocking; the synchronizer runs each task on the blocking pool.
    pub fn run(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        if !self.source.exists() {
            debug!("[{}] source {:?} does not exist, nothing to sync", self.name, self.source);
            return Ok(report);
        }

        for destination in &self.destinations {
            if destination.starts_with(&self.source) {
                debug!("[{}] destination {:?} lies inside the source, skipping", self.name, destination);
                continue;
            }
            report += match &self.mode {
                SyncMode::Tree => self.copy_tree(destination)?,
                SyncMode::Files(names) => self.copy_files(names, destination)?,
            };
        }

        debug!(
            "[{}] {} copied, {} unchanged, {} skipped",
            self.name, report.copied, report.unchanged, report.skipped
        );
        Ok(report)
    }

    fn copy_tree(&self, destination: &Path) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let filter = &self.filter;

        // Symlinked entries (e.g. composer path repositories) are copied as
        // their targets; link cycles surface as walk errors.
        let walker = WalkDir::new(&self.source)
            .min_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                let relative = entry.path().strip_prefix(&self.source).unwrap_or(entry.path());
                let accepted = filter.accepts(entry.path(), relative);
                if !accepted {
                    report.skipped += 1;
                }
                accepted
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| walk_error(&self.source, e))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        for file in files {
            let relative = file
                .strip_prefix(&self.source)
                .map_err(|e| Error::Other(e.to_string()))?;
            if copy_if_changed(&file, &destination.join(relative))? {
                report.copied += 1;
            } else {
                report.unchanged += 1;
            }
        }
        Ok(report)
    }

    fn copy_files(&self, names: &[String], destination: &Path) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for name in names {
            let file = self.source.join(name);
            if !file.is_file() {
                continue;
            }
            if copy_if_changed(&file, &destination.join(name))? {
                report.copied += 1;
            } else {
                report.unchanged += 1;
            }
        }
        Ok(report)
    }
}

/// Unreadable entries and link cycles abort the task
pub(crate) fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let path = e.path().unwrap_or(root).to_path_buf();
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    Error::io(path, source)
}

pub struct Synchronizer;

impl Synchronizer {
    /// The tasks for one build, in a fixed order: php, library, vendor, composer.
    /// Vendor and composer appear only when enabled; no destinations means no tasks.
    pub fn tasks(config: &ResolvedConfig, is_dev: bool) -> Vec<SyncTask> {
        let paths = Paths::new(config, is_dev);
        let destinations = paths.sync_destinations();
        if destinations.is_empty() {
            return Vec::new();
        }

        let plugin_source = &config.paths.wordpress_plugin;
        let mut plugin_filter =
            SyncFilter::new(&config.sync.exclude).skip_subtree(paths.direct_library_path());
        if config.sync.vendor {
            plugin_filter = plugin_filter.skip_subtree(plugin_source.join("vendor"));
        }

        let mut tasks = vec![
            SyncTask {
                name: "php",
                source: plugin_source.clone(),
                destinations: destinations.clone(),
                filter: plugin_filter,
                mode: SyncMode::Tree,
            },
            SyncTask {
                name: "library",
                source: paths.direct_library_path().to_path_buf(),
                destinations: destinations
                    .iter()
                    .map(|d| d.join(&config.paths.plugin_library))
                    .collect(),
                filter: SyncFilter::new(&config.sync.exclude),
                mode: SyncMode::Tree,
            },
        ];

        if config.sync.vendor {
            tasks.push(SyncTask {
                name: "vendor",
                source: config.paths.vendor.clone(),
                destinations: destinations.iter().map(|d| d.join("vendor")).collect(),
                filter: SyncFilter::new(&config.sync.exclude),
                mode: SyncMode::Tree,
            });
        }
        if config.sync.composer {
            tasks.push(SyncTask {
                name: "composer",
                source: config.root.clone(),
                destinations,
                filter: SyncFilter::default(),
                mode: SyncMode::Files(COMPOSER_FILES.iter().map(|s| s.to_string()).collect()),
            });
        }
        tasks
    }

    /// Run every task concurrently. The first failing task fails the call.
    pub async fn sync(config: &ResolvedConfig, is_dev: bool) -> Result<SyncReport> {
        Self::run(Self::tasks(config, is_dev)).await
    }

    pub async fn run(tasks: Vec<SyncTask>) -> Result<SyncReport> {
        if tasks.is_empty() {
            debug!("No sync destinations for this build");
            return Ok(SyncReport::default());
        }

        let handles = tasks.into_iter().map(|task| async move {
            tokio::task::spawn_blocking(move || task.run())
                .await
                .map_err(|e| Error::Other(format!("sync task panicked: {e}")))?
        });

        let mut total = SyncReport::default();
        for report in try_join_all(handles).await? {
            total += report;
        }
        info!(
            "Synchronized artifacts: {} copied, {} unchanged",
            total.copied, total.unchanged
        );
        Ok(total)
    }
}
