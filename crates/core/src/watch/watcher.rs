use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::compile::AssetKind;
use crate::error::Result;
use crate::fsutil::has_hidden_component;

/// What one watcher listens to
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSpec {
    pub kind: AssetKind,
    pub roots: Vec<PathBuf>,
    pub recursive: bool,
    /// Accepted extensions; empty accepts any
    pub extensions: Vec<&'static str>,
    /// When set, only these file names are accepted
    pub file_names: Vec<&'static str>,
    /// Subtrees whose changes are ignored (typically build outputs)
    pub ignore: Vec<PathBuf>,
}

impl WatchSpec {
    pub fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            roots: Vec::new(),
            recursive: true,
            extensions: Vec::new(),
            file_names: Vec::new(),
            ignore: Vec::new(),
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        self
    }

    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    pub fn extensions(mut self, extensions: &[&'static str]) -> Self {
        self.extensions = extensions.to_vec();
        self
    }

    pub fn file_names(mut self, names: &[&'static str]) -> Self {
        self.file_names = names.to_vec();
        self
    }

    pub fn ignore(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ignore.push(dir.into());
        self
    }

    /// Whether a change at `path` concerns this watcher
    pub fn matches(&self, path: &Path) -> bool {
        let Some(root) = self.roots.iter().find(|root| path.starts_with(root)) else {
            return false;
        };
        let relative = path.strip_prefix(root).unwrap_or(path);
        if has_hidden_component(relative) {
            return false;
        }
        if self.ignore.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        if !self.file_names.is_empty() {
            return path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| self.file_names.contains(&n));
        }
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

/// Recursive OS watcher feeding a debouncer. Dropping it stops the watch.
pub struct FileWatcher {
    kind: AssetKind,
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch every existing root of `spec`; roots missing on disk are skipped.
    pub fn start(spec: WatchSpec, sender: mpsc::Sender<PathBuf>) -> Result<Self> {
        let kind = spec.kind;
        let roots = spec.roots.clone();
        let mode = if spec.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    for path in event.paths.into_iter().filter(|p| spec.matches(p)) {
                        trace!("[{}] change: {:?}", spec.kind, path);
                        // A full queue already guarantees a rebuild
                        let _ = sender.try_send(path);
                    }
                }
                Err(e) => warn!("[{}] watch error: {}", spec.kind, e),
            },
            Config::default(),
        )?;

        for root in &roots {
            if root.exists() {
                watcher.watch(root, mode)?;
                debug!("[{}] watching {:?}", kind, root);
            } else {
                debug!("[{}] {:?} does not exist, not watched", kind, root);
            }
        }

        Ok(Self {
            kind,
            _watcher: watcher,
        })
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_filter() {
        let spec = WatchSpec::new(AssetKind::Style)
            .root("/project/src/styles")
            .extensions(&["scss", "sass", "css"]);

        assert!(spec.matches(Path::new("/project/src/styles/main.scss")));
        assert!(spec.matches(Path::new("/project/src/styles/partials/_nav.SCSS")));
        assert!(!spec.matches(Path::new("/project/src/styles/readme.md")));
        assert!(!spec.matches(Path::new("/project/src/index.js")));
    }

    #[test]
    fn test_hidden_and_ignored_paths() {
        let spec = WatchSpec::new(AssetKind::Files)
            .root("/project/wordpress-plugin")
            .ignore("/project/wordpress-plugin/assets/lib");

        assert!(spec.matches(Path::new("/project/wordpress-plugin/includes/admin.php")));
        assert!(!spec.matches(Path::new("/project/wordpress-plugin/.git/index")));
        assert!(!spec.matches(Path::new("/project/wordpress-plugin/assets/lib/demo.js")));
        assert!(!spec.matches(Path::new(
            "/project/wordpress-plugin/assets/.wpbuild-scripts-x/demo.js"
        )));
    }

    #[test]
    fn test_file_names() {
        let spec = WatchSpec::new(AssetKind::Composer)
            .root("/project")
            .non_recursive()
            .file_names(&["composer.json", "composer.lock"]);

        assert!(spec.matches(Path::new("/project/composer.lock")));
        assert!(!spec.matches(Path::new("/project/package.json")));
    }

    #[tokio::test]
    async fn test_missing_root_is_skipped() {
        let temp = tempfile::TempDir::new().unwrap();
        let (sender, _receiver) = mpsc::channel(4);
        let spec = WatchSpec::new(AssetKind::Script).root(temp.path().join("missing"));

        let watcher = FileWatcher::start(spec, sender).unwrap();
        assert_eq!(watcher.kind(), AssetKind::Script);
    }
}
