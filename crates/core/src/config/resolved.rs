use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compile::OutputFormat;

use super::Environment;

/// Fully resolved build configuration.
///
/// Produced once per invocation by [`super::ConfigResolver`] and never mutated
/// afterwards. Every path is absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    pub copyright: String,

    pub root: PathBuf,
    pub environment: Environment,
    /// Name of the variant this configuration was resolved for, if any
    pub variant: Option<String>,
    pub log_level: Option<String>,

    pub entry: PathBuf,
    pub global_name: String,
    pub file_name: String,

    pub paths: ResolvedPaths,
    pub plugin: PluginSettings,
    pub features: Features,
    pub build: BuildSettings,
    pub typescript: TypeScriptSettings,
    pub wordpress: WordPressTargets,
    pub sync: SyncSettings,
    pub watch: WatchSettings,
    pub tools: ToolPaths,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaths {
    pub dist: PathBuf,
    pub php: PathBuf,
    pub styles: PathBuf,
    pub wordpress_plugin: PathBuf,
    pub library_assets: PathBuf,
    /// Relative location of the library inside a plugin destination
    pub plugin_library: PathBuf,
    /// Relative location of the PHP sources inside a plugin destination
    pub plugin_php: PathBuf,
    pub languages: PathBuf,
    pub vendor: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginSettings {
    pub package_name: String,
    pub main_file: String,
    pub text_domain: String,
    pub headers: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub translations: bool,
    pub live_reload: bool,
    /// `None` means "derive from the build mode"
    pub create_dist: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    pub target: String,
    pub formats: Vec<OutputFormat>,
    pub minify: Option<bool>,
    pub sourcemap: Option<bool>,
    pub externals: IndexMap<String, String>,
    pub loaders: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeScriptSettings {
    pub enabled: bool,
    pub entry: PathBuf,
    pub tsconfig: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordPressTargets {
    pub dev_target: Option<PathBuf>,
    pub targets: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncSettings {
    pub exclude: Vec<String>,
    pub vendor: bool,
    pub composer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchSettings {
    pub debounce: Duration,
    pub live_reload_port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    pub esbuild: String,
    pub sass: String,
    pub wp: String,
}

impl ResolvedConfig {
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Entry the script compiler bundles: the TypeScript entry when that
    /// toolchain is enabled, the primary entry otherwise.
    pub fn script_entry(&self) -> &Path {
        if self.typescript.enabled {
            &self.typescript.entry
        } else {
            &self.entry
        }
    }

    /// Minification unless explicitly configured: on for production builds.
    pub fn minify(&self, is_dev: bool) -> bool {
        self.build.minify.unwrap_or(!is_dev)
    }

    /// Source maps unless explicitly configured: on for development builds.
    pub fn sourcemap(&self, is_dev: bool) -> bool {
        self.build.sourcemap.unwrap_or(is_dev)
    }

    /// Variant label used in metadata placeholders; empty without a variant
    pub fn variant_label(&self) -> &str {
        self.variant.as_deref().unwrap_or("")
    }
}
