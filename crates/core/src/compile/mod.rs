//! Asset compilers
//!
//! Three independent pipelines (scripts, styles, translation catalogs), each
//! driving an external tool through a collaborator trait:
//!
//! - [`ScriptCompiler`] over a [`Bundler`] (esbuild)
//! - [`StyleCompiler`] over a [`StyleEngine`] (dart-sass)
//! - [`TranslationCompiler`] over a [`CatalogGenerator`] (`wp i18n make-pot`)

pub mod banner;
pub mod script;
mod sourcemap;
pub mod style;
pub mod tools;
pub mod translation;
mod umd;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::config::ResolvedConfig;
use crate::paths::{CHUNK_DIR, Paths};

pub use banner::banner;
pub use script::ScriptCompiler;
pub use style::StyleCompiler;
pub use tools::{
    Bundler, CatalogGenerator, CatalogRequest, EsbuildBundler, OutputStyle, SassEngine,
    StyleEngine, StyleOutput, StyleRequest, ToolCommand, WpCliCatalogGenerator,
};
pub use translation::{CatalogOutcome, TranslationCompiler};

/// What a compiler or watcher works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Script,
    Style,
    Translations,
    Composer,
    Files,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Script => "script",
            AssetKind::Style => "style",
            AssetKind::Translations => "translations",
            AssetKind::Composer => "composer",
            AssetKind::Files => "files",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Script output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Self-executing bundle wrapped in a universal module pattern
    #[serde(rename = "iife", alias = "umd")]
    SelfExecuting,
    /// Standard import/export syntax with code splitting
    #[serde(rename = "esm")]
    NativeModule,
    #[serde(rename = "cjs")]
    CommonJs,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [
        OutputFormat::SelfExecuting,
        OutputFormat::NativeModule,
        OutputFormat::CommonJs,
    ];

    /// esbuild's `--format` value
    pub fn esbuild_format(&self) -> &'static str {
        match self {
            OutputFormat::SelfExecuting => "iife",
            OutputFormat::NativeModule => "esm",
            OutputFormat::CommonJs => "cjs",
        }
    }
}

/// Where a bundler writes
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLocation {
    File(PathBuf),
    /// Code-split output: `<dir>/<entry_name>.js` plus chunks under `<dir>/<chunk_dir>/`
    Directory {
        dir: PathBuf,
        entry_name: String,
        chunk_dir: String,
    },
}

/// One bundler invocation, derived fresh for every compile call
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationTarget {
    pub entry: PathBuf,
    pub format: OutputFormat,
    pub output: OutputLocation,
    pub minify: bool,
    pub sourcemap: bool,
    pub target: String,
    /// Global the bundler assigns the module to (self-executing format only)
    pub global_name: Option<String>,
    pub externals: IndexMap<String, String>,
    pub loaders: IndexMap<String, String>,
    pub tsconfig: Option<PathBuf>,
}

impl CompilationTarget {
    /// Target for `format`, or `None` when the path deriver skips that format.
    pub fn derive(config: &ResolvedConfig, is_dev: bool, format: OutputFormat) -> Option<Self> {
        let paths = Paths::new(config, is_dev);
        let output = match format {
            OutputFormat::NativeModule => OutputLocation::Directory {
                dir: paths.direct_library_path().to_path_buf(),
                entry_name: format!("{}.esm", config.file_name),
                chunk_dir: CHUNK_DIR.to_string(),
            },
            _ => OutputLocation::File(paths.output_path(format)?),
        };

        Some(Self {
            entry: config.script_entry().to_path_buf(),
            format,
            output,
            minify: config.minify(is_dev),
            sourcemap: config.sourcemap(is_dev),
            target: config.build.target.clone(),
            global_name: (format == OutputFormat::SelfExecuting)
                .then(|| config.global_name.clone()),
            externals: config.build.externals.clone(),
            loaders: config.build.loaders.clone(),
            tsconfig: config
                .typescript
                .enabled
                .then(|| config.typescript.tsconfig.clone()),
        })
    }

    /// Same invocation, writing somewhere else
    pub fn with_output(&self, output: OutputLocation) -> Self {
        Self {
            output,
            ..self.clone()
        }
    }
}

/// Formats built for one compile call: self-executing always, native modules
/// always in development and otherwise when configured, CommonJS when
/// configured. Order is stable.
pub fn formats_for(config: &ResolvedConfig, is_dev: bool) -> Vec<OutputFormat> {
    OutputFormat::ALL
        .into_iter()
        .filter(|format| match format {
            OutputFormat::SelfExecuting => true,
            OutputFormat::NativeModule => is_dev || config.build.formats.contains(format),
            OutputFormat::CommonJs => config.build.formats.contains(format),
        })
        .collect()
}
