//! Fixtures and in-process stand-ins for the external compilers
//!
//! Available to unit tests and, through the `testing` feature, to the
//! workspace integration tests.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::compile::{
    AssetKind, Bundler, CatalogGenerator, CatalogRequest, CompilationTarget, OutputFormat,
    OutputLocation, StyleEngine, StyleOutput, StyleRequest,
};
use crate::config::{
    BuildSettings, Environment, Features, PluginSettings, ResolvedConfig, ResolvedPaths,
    SyncSettings, ToolPaths, TypeScriptSettings, WatchSettings, WordPressTargets,
};
use crate::error::{Error, Result};

/// A production configuration rooted at `root` with every path inside it.
pub fn sample_config(root: impl AsRef<Path>) -> ResolvedConfig {
    let root = root.as_ref().to_path_buf();
    let plugin = root.join("wordpress-plugin");

    ResolvedConfig {
        name: "demo".to_string(),
        version: "1.2.3".to_string(),
        description: None,
        author: Some("Demo Author".to_string()),
        license: None,
        homepage: None,
        copyright: "Copyright (c) 2024 Demo Author".to_string(),
        environment: Environment::Production,
        variant: None,
        log_level: None,
        entry: root.join("src/index.js"),
        global_name: "Demo".to_string(),
        file_name: "demo".to_string(),
        paths: ResolvedPaths {
            dist: root.join("dist"),
            php: plugin.join("includes"),
            styles: root.join("src/styles/main.scss"),
            wordpress_plugin: plugin.clone(),
            library_assets: plugin.join("assets/lib"),
            plugin_library: PathBuf::from("assets/lib"),
            plugin_php: PathBuf::from("includes"),
            languages: plugin.join("languages"),
            vendor: root.join("vendor"),
        },
        plugin: PluginSettings {
            package_name: "demo-plugin".to_string(),
            main_file: "demo-plugin.php".to_string(),
            text_domain: "demo-plugin".to_string(),
            headers: IndexMap::new(),
        },
        features: Features {
            translations: true,
            live_reload: true,
            create_dist: None,
        },
        build: BuildSettings {
            target: "es2017".to_string(),
            formats: vec![OutputFormat::SelfExecuting],
            minify: None,
            sourcemap: None,
            externals: IndexMap::new(),
            loaders: IndexMap::new(),
        },
        typescript: TypeScriptSettings {
            enabled: false,
            entry: root.join("src/index.ts"),
            tsconfig: root.join("tsconfig.json"),
        },
        wordpress: WordPressTargets::default(),
        sync: SyncSettings {
            exclude: Vec::new(),
            vendor: false,
            composer: true,
        },
        watch: WatchSettings {
            debounce: Duration::from_millis(300),
            live_reload_port: 35729,
        },
        tools: ToolPaths {
            esbuild: "esbuild".to_string(),
            sass: "sass".to_string(),
            wp: "wp".to_string(),
        },
        root,
    }
}

const FAKE_MAP: &str = r#"{"version":3,"sources":["../../src/index.js"],"mappings":"AAAA"}"#;

fn write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| Error::io(path, e))
}

/// Writes a tiny bundle the way esbuild lays its output out
#[derive(Debug, Clone, Default)]
pub struct FakeBundler {
    export: String,
    chunks: usize,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeBundler {
    pub fn exporting(value: &str) -> Self {
        Self {
            export: value.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Number of shared chunks in code-split output
    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn emit(path: &Path, code: &str, sourcemap: bool) -> Result<()> {
        if !sourcemap {
            return write(path, code);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        write(path, &format!("{code}\n//# sourceMappingURL={name}.map\n"))?;
        write(&PathBuf::from(format!("{}.map", path.display())), FAKE_MAP)
    }
}

#[async_trait]
impl Bundler for FakeBundler {
    async fn bundle(&self, target: &CompilationTarget) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(Error::compile(AssetKind::Script, message.clone()));
        }

        let export = serde_json::to_string(&self.export)?;
        match &target.output {
            OutputLocation::File(path) => {
                let code = match target.format {
                    OutputFormat::SelfExecuting => format!(
                        "var __wpbuild_module = (() => {{ return {{ __esModule: true, default: {export} }}; }})();"
                    ),
                    _ => format!("module.exports = {{ default: {export} }};"),
                };
                Self::emit(path, &code, target.sourcemap)
            }
            OutputLocation::Directory {
                dir,
                entry_name,
                chunk_dir,
            } => {
                let mut imports = String::new();
                for i in 0..self.chunks {
                    let chunk = format!("{chunk_dir}/chunk-{i:08X}.js");
                    Self::emit(&dir.join(&chunk), &format!("export const part{i} = {i};"), target.sourcemap)?;
                    imports.push_str(&format!("import \"./{chunk}\";\n"));
                }
                let entry = dir.join(format!("{entry_name}.js"));
                Self::emit(&entry, &format!("{imports}export default {export};"), target.sourcemap)
            }
        }
    }
}

/// Returns fixed CSS
#[derive(Debug, Clone, Default)]
pub struct FakeStyleEngine {
    css: String,
    map: Option<String>,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeStyleEngine {
    pub fn producing(css: &str) -> Self {
        Self {
            css: css.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_map(mut self, map: &str) -> Self {
        self.map = Some(map.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StyleEngine for FakeStyleEngine {
    async fn compile(&self, request: &StyleRequest) -> Result<StyleOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(Error::compile(AssetKind::Style, message.clone()));
        }
        Ok(StyleOutput {
            css: self.css.clone(),
            source_map: self.map.clone().filter(|_| request.source_map),
        })
    }
}

/// Writes a fixed POT document to the requested destination
#[derive(Debug, Clone, Default)]
pub struct FakeCatalogGenerator {
    pot: String,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeCatalogGenerator {
    pub fn writing(pot: &str) -> Self {
        Self {
            pot: pot.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogGenerator for FakeCatalogGenerator {
    async fn generate(&self, request: &CatalogRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(Error::compile(AssetKind::Translations, message.clone()));
        }
        write(&request.dest_file, &self.pot)
    }
}
