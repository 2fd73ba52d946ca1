//! Plugin header maintenance
//!
//! Keeps the header comment of the plugin main file (`Version:`, and any
//! configured header fields) in step with the build configuration.

use indexmap::IndexMap;
use regex::{NoExpand, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::error::{Error, Result};
use crate::fsutil::write_if_changed;

pub struct MetadataRewriter;

impl MetadataRewriter {
    /// Header values for this build with placeholders expanded
    pub fn headers(config: &ResolvedConfig) -> IndexMap<String, String> {
        let mut headers = IndexMap::new();
        headers.insert("Version".to_string(), config.version.clone());
        for (key, value) in &config.plugin.headers {
            headers.insert(key.clone(), expand(value, config));
        }
        headers
    }

    /// Rewrite the main file under `plugin_root`. Returns the path when the
    /// file changed, `None` when it was already current or doesn't exist.
    pub fn rewrite(config: &ResolvedConfig, plugin_root: &Path) -> Result<Option<PathBuf>> {
        let main_file = plugin_root.join(&config.plugin.main_file);
        let source = match fs::read_to_string(&main_file) {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Plugin main file {:?} not found, header not updated", main_file);
                return Ok(None);
            }
            Err(e) => return Err(Error::io(&main_file, e)),
        };

        let updated = rewrite_header(&source, &Self::headers(config));
        if write_if_changed(&main_file, updated.as_bytes())? {
            info!("Updated plugin header in {}", main_file.display());
            Ok(Some(main_file))
        } else {
            debug!("Plugin header already current");
            Ok(None)
        }
    }
}

fn expand(value: &str, config: &ResolvedConfig) -> String {
    value
        .replace("{{version}}", &config.version)
        .replace("{{variant}}", config.variant_label())
        .replace("{{name}}", &config.name)
}

/// Replace ` * Key: value` lines in the first block comment, appending
/// missing keys before its closing line.
fn rewrite_header(source: &str, headers: &IndexMap<String, String>) -> String {
    let Some(start) = source.find("/*") else {
        return source.to_string();
    };
    let Some(end) = source[start..].find("*/").map(|i| start + i) else {
        return source.to_string();
    };

    let mut block = source[start..end].to_string();
    let mut missing = Vec::new();
    for (key, value) in headers {
        let Ok(line) = Regex::new(&format!(r"(?m)^([ \t/*]*){}:[ \t]*.*$", regex::escape(key))) else {
            continue;
        };
        match line.captures(&block) {
            Some(caps) => {
                let prefix = caps.get(1).map_or("", |m| m.as_str());
                let replacement = format!("{prefix}{key}: {value}");
                block = line.replace(&block, NoExpand(&replacement)).into_owned();
            }
            None => missing.push(format!(" * {key}: {value}\n")),
        }
    }

    if !missing.is_empty() {
        let content = block.trim_end_matches([' ', '\t']).len();
        block.truncate(content);
        if !block.ends_with('\n') {
            block.push('\n');
        }
        block.push_str(&missing.concat());
        // The closing `*/` follows on its own line
        block.push(' ');
    }

    format!("{}{}{}", &source[..start], block, &source[end..])
}
