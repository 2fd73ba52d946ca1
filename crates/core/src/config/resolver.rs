//! Configuration resolution
//!
//! Loads `wpbuild.json`, applies the overlay selected by an environment or
//! variant name, and turns the merged document into a [`ResolvedConfig`].

use chrono::Datelike;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::compile::OutputFormat;
use crate::error::{Error, IoResultExt, Result};

use super::merge::merge_overlay;
use super::resolved::{
    BuildSettings, Features, PluginSettings, ResolvedConfig, ResolvedPaths, SyncSettings,
    ToolPaths, TypeScriptSettings, WatchSettings, WordPressTargets,
};
use super::settings::{BuildConfig, PackageManifest};
use super::Environment;

pub const BASE_CONFIG_FILE: &str = "wpbuild.json";
pub const TSCONFIG_FILE: &str = "tsconfig.json";
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_LIVE_RELOAD_PORT: u16 = 35729;

/// Path of the overlay file for an environment or variant name.
pub fn overlay_file(root: &Path, name: &str) -> PathBuf {
    root.join(format!("wpbuild.{name}.json"))
}

/// How the overlay for a requested name was found
#[derive(Debug, Clone, PartialEq)]
enum OverlaySelection {
    /// `development` or `production` with its own overlay file
    Canonical(Environment),
    /// A variant with a dedicated overlay file
    Variant(String),
    /// A variant without an overlay, layered on the development overlay
    VariantFallback(String),
}

pub struct ConfigResolver;

impl ConfigResolver {
    /// Resolve the configuration of the project at `project_root` for an
    /// environment (`development` / `production`) or a variant name.
    pub fn resolve(project_root: &Path, name: &str) -> Result<ResolvedConfig> {
        let root = absolute_root(project_root)?;

        let base_path = root.join(BASE_CONFIG_FILE);
        if !base_path.is_file() {
            return Err(Error::ConfigNotFound(base_path));
        }

        let (overlay_path, selection) = Self::locate_overlay(&root, name)?;
        debug!("Using overlay {:?} ({:?})", overlay_path, selection);

        let base = read_json(&base_path)?;
        let overlay = read_json(&overlay_path)?;
        let merged = merge_overlay(&base, &overlay);

        let mut config: BuildConfig =
            serde_json::from_value(merged).map_err(|e| Error::InvalidConfig {
                path: overlay_path.clone(),
                message: e.to_string(),
            })?;

        let manifest_path = root.join("package.json");
        if manifest_path.is_file() {
            let manifest: PackageManifest = serde_json::from_value(read_json(&manifest_path)?)
                .map_err(|e| Error::InvalidConfig {
                    path: manifest_path.clone(),
                    message: e.to_string(),
                })?;
            config.fill_from_manifest(manifest);
        }

        config.validate()?;

        let (environment, variant) = match selection {
            OverlaySelection::Canonical(env) => (env, None),
            OverlaySelection::Variant(variant) => (
                config.environment.unwrap_or(Environment::Production),
                Some(variant),
            ),
            OverlaySelection::VariantFallback(variant) => {
                (Environment::Development, Some(variant))
            }
        };

        let resolved = Self::finish(root, config, environment, variant);
        info!(
            "Resolved configuration for {} {} ({}{})",
            resolved.name,
            resolved.version,
            resolved.environment,
            resolved
                .variant
                .as_deref()
                .map(|v| format!(", variant {v}"))
                .unwrap_or_default()
        );
        Ok(resolved)
    }

    fn locate_overlay(root: &Path, name: &str) -> Result<(PathBuf, OverlaySelection)> {
        if !is_valid_name(name) {
            return Err(Error::Other(format!(
                "Invalid environment or variant name '{name}'"
            )));
        }

        let dedicated = overlay_file(root, name);
        let canonical = Environment::from_name(name);

        if dedicated.is_file() {
            let selection = match canonical {
                Some(env) => OverlaySelection::Canonical(env),
                None => OverlaySelection::Variant(name.to_string()),
            };
            return Ok((dedicated, selection));
        }

        if canonical.is_some() {
            return Err(Error::EnvironmentConfigNotFound {
                name: name.to_string(),
                tried: vec![dedicated],
            });
        }

        let fallback = overlay_file(root, Environment::Development.as_str());
        if fallback.is_file() {
            debug!(
                "No overlay for variant '{}', falling back to development",
                name
            );
            return Ok((fallback, OverlaySelection::VariantFallback(name.to_string())));
        }

        Err(Error::EnvironmentConfigNotFound {
            name: name.to_string(),
            tried: vec![dedicated, fallback],
        })
    }

    fn finish(
        root: PathBuf,
        config: BuildConfig,
        environment: Environment,
        variant: Option<String>,
    ) -> ResolvedConfig {
        let at = |fragment: &str| normalize(&root.join(fragment));
        // validate() guarantees the required fields
        let required = |value: Option<String>| value.unwrap_or_default();

        let name = required(config.name);
        let package_name = required(config.plugin.package_name);
        let entry = at(&required(config.entry));

        let wordpress_plugin = at(&required(config.paths.wordpress_plugin));
        let library_assets = at(&required(config.paths.library_assets));
        let php = at(&required(config.paths.php));

        let plugin_library = config
            .paths
            .plugin_library
            .map(PathBuf::from)
            .or_else(|| relative_within(&library_assets, &wordpress_plugin))
            .unwrap_or_else(|| PathBuf::from("assets/lib"));
        let plugin_php = config
            .paths
            .plugin_php
            .map(PathBuf::from)
            .or_else(|| relative_within(&php, &wordpress_plugin))
            .or_else(|| php.file_name().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("includes"));

        let paths = ResolvedPaths {
            dist: at(&required(config.paths.dist)),
            styles: at(&required(config.paths.styles)),
            languages: config
                .paths
                .languages
                .map(|l| at(&l))
                .unwrap_or_else(|| wordpress_plugin.join("languages")),
            vendor: at(config.paths.vendor.as_deref().unwrap_or("vendor")),
            php,
            wordpress_plugin,
            library_assets,
            plugin_library,
            plugin_php,
        };

        let typescript = match config.typescript {
            Some(ts) => TypeScriptSettings {
                enabled: ts.enabled,
                entry: ts
                    .entry
                    .map(|e| at(&e))
                    .unwrap_or_else(|| typescript_entry(&entry)),
                tsconfig: at(ts.tsconfig.as_deref().unwrap_or(TSCONFIG_FILE)),
            },
            None => {
                let tsconfig = root.join(TSCONFIG_FILE);
                let enabled = tsconfig.is_file();
                debug!("TypeScript toolchain auto-detected: {}", enabled);
                TypeScriptSettings {
                    enabled,
                    entry: typescript_entry(&entry),
                    tsconfig,
                }
            }
        };

        let author = config.author;
        let copyright = config.copyright.unwrap_or_else(|| {
            format!(
                "Copyright (c) {} {}",
                chrono::Local::now().year(),
                author.as_deref().unwrap_or(&name)
            )
        });

        ResolvedConfig {
            version: config.version.unwrap_or_else(|| "0.0.0".to_string()),
            description: config.description,
            license: config.license,
            homepage: config.homepage,
            copyright,
            author,
            environment,
            variant,
            log_level: config.log_level,
            global_name: config
                .global_name
                .unwrap_or_else(|| pascal_case(&name)),
            file_name: config.file_name.unwrap_or_else(|| name.clone()),
            entry,
            paths,
            plugin: PluginSettings {
                main_file: config
                    .plugin
                    .main_file
                    .unwrap_or_else(|| format!("{package_name}.php")),
                text_domain: config
                    .plugin
                    .text_domain
                    .unwrap_or_else(|| package_name.clone()),
                headers: config.plugin.headers,
                package_name,
            },
            features: Features {
                translations: config.features.translations.unwrap_or(true),
                live_reload: config.features.live_reload.unwrap_or(true),
                create_dist: config.features.create_dist,
            },
            build: BuildSettings {
                target: config
                    .build
                    .target
                    .unwrap_or_else(|| "es2017".to_string()),
                formats: config
                    .build
                    .formats
                    .unwrap_or_else(|| vec![OutputFormat::SelfExecuting]),
                minify: config.build.minify,
                sourcemap: config.build.sourcemap,
                externals: config.build.externals,
                loaders: config.build.loaders,
            },
            typescript,
            wordpress: WordPressTargets {
                dev_target: config.wordpress.dev_target.map(|t| at(&t)),
                targets: config.wordpress.targets.iter().map(|t| at(t)).collect(),
            },
            sync: SyncSettings {
                exclude: config.sync.exclude,
                vendor: config.sync.vendor.unwrap_or(false),
                composer: config.sync.composer.unwrap_or(true),
            },
            watch: WatchSettings {
                debounce: Duration::from_millis(
                    config.watch.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
                ),
                live_reload_port: config
                    .watch
                    .live_reload_port
                    .unwrap_or(DEFAULT_LIVE_RELOAD_PORT),
            },
            tools: ToolPaths {
                esbuild: config.tools.esbuild.unwrap_or_else(|| "esbuild".to_string()),
                sass: config.tools.sass.unwrap_or_else(|| "sass".to_string()),
                wp: config.tools.wp.unwrap_or_else(|| "wp".to_string()),
            },
            root,
            name,
        }
    }
}

fn absolute_root(project_root: &Path) -> Result<PathBuf> {
    let root = if project_root.is_absolute() {
        project_root.to_path_buf()
    } else {
        std::env::current_dir()
            .at(project_root)?
            .join(project_root)
    };
    Ok(normalize(&root))
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path).at(path)?;
    serde_json::from_str(&contents).map_err(|e| Error::InvalidConfig {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lexically normalize a path, dropping `.` and folding `..`.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn relative_within(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// `src/index.js` -> `src/index.ts`, `app.jsx` -> `app.tsx`
fn typescript_entry(entry: &Path) -> PathBuf {
    let ext = entry.extension().and_then(|e| e.to_str()).unwrap_or("");
    let swapped = match ext {
        "js" | "" => "ts",
        "jsx" => "tsx",
        "mjs" => "mts",
        "cjs" => "cts",
        other => other,
    };
    entry.with_extension(swapped)
}

fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, file: &str, value: Value) {
        fs::write(dir.join(file), serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            BASE_CONFIG_FILE,
            json!({
                "name": "edd-github-downloads",
                "version": "1.4.0",
                "entry": "./src/index.js",
                "paths": {
                    "dist": "dist",
                    "php": "wordpress-plugin/includes",
                    "styles": "src/styles/main.scss",
                    "wordpressPlugin": "wordpress-plugin",
                    "libraryAssets": "wordpress-plugin/assets/lib"
                },
                "plugin": { "packageName": "edd-github-downloads" },
                "build": { "externals": { "react": "React" } }
            }),
        );
        write(
            temp.path(),
            "wpbuild.development.json",
            json!({ "build": { "minify": false, "sourcemap": true } }),
        );
        write(
            temp.path(),
            "wpbuild.production.json",
            json!({ "build": { "minify": true, "sourcemap": false } }),
        );
        temp
    }

    #[test]
    fn test_missing_base_config() {
        let temp = TempDir::new().unwrap();
        let err = ConfigResolver::resolve(temp.path(), "production").unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }

    #[test]
    fn test_canonical_environment_without_overlay() {
        let temp = project();
        fs::remove_file(temp.path().join("wpbuild.production.json")).unwrap();

        let err = ConfigResolver::resolve(temp.path(), "production").unwrap_err();
        assert!(matches!(err, Error::EnvironmentConfigNotFound { .. }));
    }

    #[test]
    fn test_variant_without_any_overlay() {
        let temp = project();
        fs::remove_file(temp.path().join("wpbuild.development.json")).unwrap();

        match ConfigResolver::resolve(temp.path(), "staging").unwrap_err() {
            Error::EnvironmentConfigNotFound { name, tried } => {
                assert_eq!(name, "staging");
                assert_eq!(tried.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_variant_falls_back_to_development() {
        let temp = project();

        let config = ConfigResolver::resolve(temp.path(), "staging").unwrap();

        assert_eq!(config.variant.as_deref(), Some("staging"));
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.build.minify, Some(false));
        assert_eq!(config.build.sourcemap, Some(true));
        assert!(!config.minify(config.is_development()));
        assert!(config.sourcemap(config.is_development()));
    }

    #[test]
    fn test_dedicated_variant_overlay() {
        let temp = project();
        write(
            temp.path(),
            "wpbuild.pro.json",
            json!({ "name": "edd-github-downloads-pro", "features": { "createDist": true } }),
        );

        let config = ConfigResolver::resolve(temp.path(), "pro").unwrap();

        assert_eq!(config.variant.as_deref(), Some("pro"));
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.name, "edd-github-downloads-pro");
        assert_eq!(config.features.create_dist, Some(true));
        // The production overlay is not involved
        assert_eq!(config.build.minify, None);
    }

    #[test]
    fn test_paths_are_absolute() {
        let temp = project();
        let config = ConfigResolver::resolve(temp.path(), "production").unwrap();

        assert!(config.root.is_absolute());
        assert_eq!(config.entry, config.root.join("src/index.js"));
        assert_eq!(
            config.paths.library_assets,
            config.root.join("wordpress-plugin/assets/lib")
        );
        assert_eq!(config.paths.plugin_library, PathBuf::from("assets/lib"));
        assert_eq!(config.paths.plugin_php, PathBuf::from("includes"));
        assert_eq!(
            config.paths.languages,
            config.root.join("wordpress-plugin/languages")
        );
        assert_eq!(config.global_name, "EddGithubDownloads");
        assert_eq!(config.plugin.main_file, "edd-github-downloads.php");
    }

    #[test]
    fn test_typescript_detected_from_tsconfig() {
        let temp = project();
        let config = ConfigResolver::resolve(temp.path(), "production").unwrap();
        assert!(!config.typescript.enabled);
        assert_eq!(config.script_entry(), config.root.join("src/index.js"));

        fs::write(temp.path().join(TSCONFIG_FILE), "{}").unwrap();
        let config = ConfigResolver::resolve(temp.path(), "production").unwrap();
        assert!(config.typescript.enabled);
        assert_eq!(config.script_entry(), config.root.join("src/index.ts"));
    }

    #[test]
    fn test_validation_runs_after_merge() {
        let temp = project();
        write(
            temp.path(),
            "wpbuild.production.json",
            json!({ "paths": { "styles": null } }),
        );

        let err = ConfigResolver::resolve(temp.path(), "production").unwrap_err();
        assert!(matches!(err, Error::Validation("paths.styles")));
    }

    #[test]
    fn test_package_json_supplies_metadata() {
        let temp = project();
        write(
            temp.path(),
            "package.json",
            json!({ "version": "9.9.9", "license": "GPL-2.0-or-later", "author": "Jane Doe" }),
        );

        let config = ConfigResolver::resolve(temp.path(), "production").unwrap();
        // The build definition's own version wins
        assert_eq!(config.version, "1.4.0");
        assert_eq!(config.license.as_deref(), Some("GPL-2.0-or-later"));
        assert!(config.copyright.ends_with("Jane Doe"));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let temp = project();
        assert!(ConfigResolver::resolve(temp.path(), "../etc").is_err());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(pascal_case("my-lib_name"), "MyLibName");
        assert_eq!(
            typescript_entry(Path::new("src/app.jsx")),
            PathBuf::from("src/app.tsx")
        );
        assert_eq!(
            normalize(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
    }
}
