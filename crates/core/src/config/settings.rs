use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compile::OutputFormat;
use crate::error::{Error, Result};

use super::Environment;

/// Build definition as written in `wpbuild.json` and its overlays.
///
/// Everything is optional here; [`BuildConfig::validate`] enforces the
/// required fields once the overlay has been merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,

    /// Only meaningful inside a variant overlay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub plugin: PluginConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub build: BuildOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typescript: Option<TypeScriptConfig>,
    #[serde(default)]
    pub wordpress: WordPressConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wordpress_plugin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_assets: Option<String>,
    /// Library location inside a plugin destination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_library: Option<String>,
    /// PHP source location inside a plugin destination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_php: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_domain: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_reload: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_dist: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<OutputFormat>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sourcemap: Option<bool>,
    /// Dependency name to the global symbol that provides it at runtime
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub externals: IndexMap<String, String>,
    /// File extension to esbuild loader
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub loaders: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeScriptConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsconfig: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPressConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_reload_port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esbuild: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wp: Option<String>,
}

/// Fields pulled from `package.json` when the build definition omits them
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    pub version: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub homepage: Option<String>,
    pub author: Option<ManifestAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestAuthor {
    Name(String),
    Person { name: String },
}

impl ManifestAuthor {
    pub fn name(&self) -> &str {
        match self {
            ManifestAuthor::Name(name) => name,
            ManifestAuthor::Person { name } => name,
        }
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl BuildConfig {
    /// Check required fields, reporting the first one that is missing.
    pub fn validate(&self) -> Result<()> {
        let required: [(&'static str, &Option<String>); 8] = [
            ("name", &self.name),
            ("entry", &self.entry),
            ("paths.dist", &self.paths.dist),
            ("paths.php", &self.paths.php),
            ("paths.styles", &self.paths.styles),
            ("paths.wordpressPlugin", &self.paths.wordpress_plugin),
            ("paths.libraryAssets", &self.paths.library_assets),
            ("plugin.packageName", &self.plugin.package_name),
        ];

        match required.iter().find(|(_, value)| !present(value)) {
            Some((field, _)) => Err(Error::Validation(*field)),
            None => Ok(()),
        }
    }

    /// Fill identity fields the definition leaves empty from `package.json`.
    pub fn fill_from_manifest(&mut self, manifest: PackageManifest) {
        if !present(&self.version) {
            self.version = manifest.version;
        }
        if !present(&self.description) {
            self.description = manifest.description;
        }
        if !present(&self.license) {
            self.license = manifest.license;
        }
        if !present(&self.homepage) {
            self.homepage = manifest.homepage;
        }
        if !present(&self.author) {
            self.author = manifest.author.map(|a| a.name().to_string());
        }
    }
}
