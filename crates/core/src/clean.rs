//! Pre-build cleanup
//!
//! Cleaning is best effort: anything that cannot be removed or created is
//! logged as a warning and the build carries on.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::paths::{CHUNK_DIR, Paths};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl CleanReport {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn remove_file(&mut self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed {:?}", path);
                self.removed.push(path.to_path_buf());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => self.warn(format!("Could not remove {}: {}", path.display(), e)),
        }
    }

    fn create_dir(&mut self, path: &Path) {
        if let Err(e) = fs::create_dir_all(path) {
            self.warn(format!("Could not create {}: {}", path.display(), e));
        }
    }
}

pub struct Cleaner;

impl Cleaner {
    /// Files this build writes into the canonical library directory
    pub fn generated_names(config: &ResolvedConfig) -> Vec<String> {
        let stem = &config.file_name;
        ["js", "js.map", "esm.js", "esm.js.map", "css", "css.map"]
            .iter()
            .map(|ext| format!("{stem}.{ext}"))
            .collect()
    }

    /// Remove generated files from the library directory and reset the dist
    /// folder. Unrelated files in the library directory are kept.
    pub fn clean(config: &ResolvedConfig, is_dev: bool) -> CleanReport {
        let paths = Paths::new(config, is_dev);
        let mut report = CleanReport::default();

        let library = paths.direct_library_path();
        if library.is_dir() {
            for name in Self::generated_names(config) {
                report.remove_file(&library.join(name));
            }
            Self::clean_chunks(&library.join(CHUNK_DIR), &mut report);
        } else {
            report.create_dir(library);
        }

        let dist = paths.dist_dir();
        if paths.should_create_dist() {
            if dist.exists() {
                Self::empty_dir(dist, &mut report);
            }
        } else {
            Self::remove_dir(dist, &mut report);
        }

        info!("Cleaned {} path(s)", report.removed.len());
        report
    }

    /// Create the directories a build writes into
    pub fn ensure_directories(config: &ResolvedConfig, is_dev: bool) -> CleanReport {
        let paths = Paths::new(config, is_dev);
        let mut report = CleanReport::default();
        report.create_dir(paths.direct_library_path());
        if config.features.translations {
            report.create_dir(&config.paths.languages);
        }
        if paths.should_create_dist() {
            report.create_dir(paths.dist_dir());
        }
        report
    }

    /// Remove the dist folder when this build doesn't produce one
    pub fn remove_stale_dist(config: &ResolvedConfig, is_dev: bool) -> CleanReport {
        let paths = Paths::new(config, is_dev);
        let mut report = CleanReport::default();
        if !paths.should_create_dist() {
            Self::remove_dir(paths.dist_dir(), &mut report);
        }
        report
    }

    fn remove_dir(dir: &Path, report: &mut CleanReport) {
        if !dir.exists() {
            return;
        }
        match fs::remove_dir_all(dir) {
            Ok(()) => {
                debug!("Removed {:?}", dir);
                report.removed.push(dir.to_path_buf());
            }
            Err(e) => report.warn(format!("Could not remove {}: {}", dir.display(), e)),
        }
    }

    fn clean_chunks(chunk_dir: &Path, report: &mut CleanReport) {
        let pattern = format!("{}/chunk-*.js*", glob::Pattern::escape(&chunk_dir.to_string_lossy()));
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => return report.warn(format!("Invalid chunk pattern {pattern}: {e}")),
        };
        for path in entries.filter_map(|e| e.ok()) {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            if name.is_some_and(|n| n.ends_with(".js") || n.ends_with(".js.map")) {
                report.remove_file(&path);
            }
        }
    }

    fn empty_dir(dir: &Path, report: &mut CleanReport) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => return report.warn(format!("Could not read {}: {}", dir.display(), e)),
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => report.removed.push(path),
                Err(e) => report.warn(format!("Could not remove {}: {}", path.display(), e)),
            }
        }
    }
}
