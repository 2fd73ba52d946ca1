//! Configuration management for wpbuild

pub mod merge;
mod resolved;
pub mod resolver;
mod settings;

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export main types
pub use merge::merge_overlay;
pub use resolved::{
    BuildSettings, Features, PluginSettings, ResolvedConfig, ResolvedPaths, SyncSettings,
    ToolPaths, TypeScriptSettings, WatchSettings, WordPressTargets,
};
pub use resolver::{ConfigResolver, BASE_CONFIG_FILE, overlay_file};
pub use settings::{BuildConfig, PackageManifest};

/// The two canonical build environments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "development" => Some(Environment::Development),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
