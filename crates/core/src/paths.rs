//! Output and destination path derivation
//!
//! Pure functions over a [`ResolvedConfig`] and an explicit development flag.
//! Nothing here touches the filesystem, so the same inputs always produce
//! the same paths.

use std::path::{Path, PathBuf};

use crate::compile::OutputFormat;
use crate::config::ResolvedConfig;

/// Subdirectory of the canonical library path holding code-split chunks
pub const CHUNK_DIR: &str = "chunks";

/// Whether a dist folder (and with it the ZIP and the non-canonical output
/// formats) is produced. An explicit `false` always wins; otherwise
/// production builds create it and development builds only on explicit `true`.
pub fn should_create_dist(explicit: Option<bool>, is_dev: bool) -> bool {
    match explicit {
        Some(flag) => flag,
        None => !is_dev,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paths<'a> {
    config: &'a ResolvedConfig,
    is_dev: bool,
}

impl<'a> Paths<'a> {
    pub fn new(config: &'a ResolvedConfig, is_dev: bool) -> Self {
        Self { config, is_dev }
    }

    /// Development flag taken from the configuration's environment
    pub fn auto(config: &'a ResolvedConfig) -> Self {
        Self::new(config, config.is_development())
    }

    pub fn is_dev(&self) -> bool {
        self.is_dev
    }

    pub fn should_create_dist(&self) -> bool {
        should_create_dist(self.config.features.create_dist, self.is_dev)
    }

    /// Canonical library path; identical for every environment.
    pub fn direct_library_path(&self) -> &'a Path {
        &self.config.paths.library_assets
    }

    /// Where the plugin loads its library from for this build: inside the
    /// development target during development, the canonical path otherwise.
    pub fn library_dir(&self) -> PathBuf {
        match (&self.config.wordpress.dev_target, self.is_dev) {
            (Some(target), true) => target.join(&self.config.paths.plugin_library),
            _ => self.direct_library_path().to_path_buf(),
        }
    }

    /// Root of the assembled plugin, or `None` when nothing is to be assembled.
    /// Development builds assemble into the development target when there is
    /// one; otherwise the plugin is assembled inside the dist folder.
    pub fn plugin_destination(&self) -> Option<PathBuf> {
        match &self.config.wordpress.dev_target {
            Some(target) if self.is_dev => Some(target.clone()),
            _ if self.should_create_dist() => {
                Some(self.dist_dir().join(&self.config.plugin.package_name))
            }
            _ => None,
        }
    }

    /// Every root the synchronizer writes to: the plugin destination plus,
    /// during development, the extra WordPress targets.
    pub fn sync_destinations(&self) -> Vec<PathBuf> {
        let mut destinations: Vec<PathBuf> = self.plugin_destination().into_iter().collect();
        if self.is_dev {
            for target in &self.config.wordpress.targets {
                if !destinations.contains(target) {
                    destinations.push(target.clone());
                }
            }
        }
        destinations
    }

    /// Output file for a script format. The self-executing and native-module
    /// formats always land in the canonical library path; other formats go to
    /// the dist folder and are skipped when there is none.
    pub fn output_path(&self, format: OutputFormat) -> Option<PathBuf> {
        let file_name = &self.config.file_name;
        match format {
            OutputFormat::SelfExecuting => {
                Some(self.direct_library_path().join(format!("{file_name}.js")))
            }
            OutputFormat::NativeModule => {
                Some(self.direct_library_path().join(format!("{file_name}.esm.js")))
            }
            OutputFormat::CommonJs => self
                .should_create_dist()
                .then(|| self.dist_dir().join(format!("{file_name}.cjs.js"))),
        }
    }

    pub fn chunk_dir(&self) -> PathBuf {
        self.direct_library_path().join(CHUNK_DIR)
    }

    pub fn css_path(&self) -> PathBuf {
        self.direct_library_path()
            .join(format!("{}.css", self.config.file_name))
    }

    /// Copies of the stylesheet fanned out from [`Self::css_path`]
    pub fn css_copies(&self) -> Vec<PathBuf> {
        if !self.should_create_dist() {
            return Vec::new();
        }
        let file = format!("{}.css", self.config.file_name);
        let direct = self.css_path();
        let mut copies = vec![self.dist_dir().join(&file)];
        let library_copy = self.library_dir().join(&file);
        if library_copy != direct {
            copies.push(library_copy);
        }
        copies
    }

    pub fn dist_dir(&self) -> &'a Path {
        &self.config.paths.dist
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dist_dir()
            .join(format!("{}.zip", self.config.plugin.package_name))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.config
            .paths
            .languages
            .join(format!("{}.pot", self.config.plugin.text_domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_config;

    #[test]
    fn test_should_create_dist_matrix() {
        // (explicit, is_dev) -> expected
        let cases = [
            (Some(false), true, false),
            (Some(false), false, false),
            (Some(true), true, true),
            (Some(true), false, true),
            (None, true, false),
            (None, false, true),
        ];
        for (explicit, is_dev, expected) in cases {
            assert_eq!(
                should_create_dist(explicit, is_dev),
                expected,
                "explicit={explicit:?} is_dev={is_dev}"
            );
        }
    }

    #[test]
    fn test_direct_library_path_ignores_environment() {
        let config = sample_config("/project");
        assert_eq!(
            Paths::new(&config, true).direct_library_path(),
            Paths::new(&config, false).direct_library_path()
        );
    }

    #[test]
    fn test_library_dir_uses_dev_target() {
        let mut config = sample_config("/project");
        assert_eq!(
            Paths::new(&config, true).library_dir(),
            PathBuf::from("/project/wordpress-plugin/assets/lib")
        );

        config.wordpress.dev_target = Some(PathBuf::from("/srv/wp/wp-content/plugins/demo"));
        assert_eq!(
            Paths::new(&config, true).library_dir(),
            PathBuf::from("/srv/wp/wp-content/plugins/demo/assets/lib")
        );
        assert_eq!(
            Paths::new(&config, false).library_dir(),
            PathBuf::from("/project/wordpress-plugin/assets/lib")
        );
    }

    #[test]
    fn test_plugin_destination() {
        let mut config = sample_config("/project");
        assert_eq!(Paths::new(&config, true).plugin_destination(), None);
        assert_eq!(
            Paths::new(&config, false).plugin_destination(),
            Some(PathBuf::from("/project/dist/demo-plugin"))
        );

        // Development with an explicit dist and no dev target assembles in dist
        config.features.create_dist = Some(true);
        assert_eq!(
            Paths::new(&config, true).plugin_destination(),
            Some(PathBuf::from("/project/dist/demo-plugin"))
        );

        config.features.create_dist = Some(false);
        assert_eq!(Paths::new(&config, false).plugin_destination(), None);

        config.wordpress.dev_target = Some(PathBuf::from("/srv/plugins/demo"));
        assert_eq!(
            Paths::new(&config, true).plugin_destination(),
            Some(PathBuf::from("/srv/plugins/demo"))
        );
    }

    #[test]
    fn test_canonical_formats_never_use_dist() {
        let config = sample_config("/project");
        for is_dev in [true, false] {
            let paths = Paths::new(&config, is_dev);
            assert_eq!(
                paths.output_path(OutputFormat::SelfExecuting),
                Some(PathBuf::from("/project/wordpress-plugin/assets/lib/demo.js"))
            );
            assert_eq!(
                paths.output_path(OutputFormat::NativeModule),
                Some(PathBuf::from("/project/wordpress-plugin/assets/lib/demo.esm.js"))
            );
        }
    }

    #[test]
    fn test_commonjs_requires_dist() {
        let mut config = sample_config("/project");
        assert_eq!(
            Paths::new(&config, false).output_path(OutputFormat::CommonJs),
            Some(PathBuf::from("/project/dist/demo.cjs.js"))
        );
        assert_eq!(Paths::new(&config, true).output_path(OutputFormat::CommonJs), None);

        config.features.create_dist = Some(false);
        assert_eq!(Paths::new(&config, false).output_path(OutputFormat::CommonJs), None);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let mut config = sample_config("/project");
        config.wordpress.dev_target = Some(PathBuf::from("/srv/plugins/demo"));
        for is_dev in [true, false] {
            let first = Paths::new(&config, is_dev);
            let second = Paths::new(&config, is_dev);
            for _ in 0..3 {
                assert_eq!(first.library_dir(), second.library_dir());
                assert_eq!(first.plugin_destination(), second.plugin_destination());
                assert_eq!(first.css_copies(), second.css_copies());
                assert_eq!(first.archive_path(), second.archive_path());
                for format in OutputFormat::ALL {
                    assert_eq!(first.output_path(format), second.output_path(format));
                }
            }
        }
    }

    #[test]
    fn test_css_copies() {
        let mut config = sample_config("/project");
        assert!(Paths::new(&config, true).css_copies().is_empty());
        assert_eq!(
            Paths::new(&config, false).css_copies(),
            vec![PathBuf::from("/project/dist/demo.css")]
        );

        config.features.create_dist = Some(true);
        config.wordpress.dev_target = Some(PathBuf::from("/srv/plugins/demo"));
        assert_eq!(
            Paths::new(&config, true).css_copies(),
            vec![
                PathBuf::from("/project/dist/demo.css"),
                PathBuf::from("/srv/plugins/demo/assets/lib/demo.css"),
            ]
        );
    }

    #[test]
    fn test_sync_destinations_include_extra_targets_in_dev() {
        let mut config = sample_config("/project");
        config.wordpress.dev_target = Some(PathBuf::from("/srv/a"));
        config.wordpress.targets = vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")];

        assert_eq!(
            Paths::new(&config, true).sync_destinations(),
            vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]
        );
        assert_eq!(
            Paths::new(&config, false).sync_destinations(),
            vec![PathBuf::from("/project/dist/demo-plugin")]
        );
    }
}
