//! Translation catalog generation
//!
//! Regenerating a POT file always changes its creation date, which would make
//! every build dirty. The catalog is replaced only when its set of message
//! keys changed; comments, references and the header entry don't count.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::error::{Error, IoResultExt, Result};
use crate::fsutil::write_atomic;
use crate::paths::Paths;

use super::{CatalogGenerator, CatalogRequest};

/// Directories never scanned for translatable strings
const SCAN_EXCLUDES: [&str; 3] = ["vendor", "node_modules", "tests"];

/// (msgctxt, msgid, msgid_plural)
type MessageKey = (Option<String>, String, Option<String>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOutcome {
    /// Translations are turned off for this configuration
    Disabled,
    /// The existing catalog already has the same keys
    Unchanged(PathBuf),
    Written(PathBuf),
}

pub struct TranslationCompiler<G> {
    generator: G,
}

impl<G: CatalogGenerator> TranslationCompiler<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub async fn compile(&self, config: &ResolvedConfig) -> Result<CatalogOutcome> {
        if !config.features.translations {
            debug!("Translations disabled, skipping catalog");
            return Ok(CatalogOutcome::Disabled);
        }

        let catalog = Paths::auto(config).catalog_path();
        let dir = catalog
            .parent()
            .ok_or_else(|| Error::Other(format!("invalid catalog path {}", catalog.display())))?;
        fs::create_dir_all(dir).at(dir)?;

        let scratch = dir.join(format!(".{}.pot.tmp", config.plugin.text_domain));
        let request = CatalogRequest {
            source_dir: config.paths.wordpress_plugin.clone(),
            dest_file: scratch.clone(),
            domain: config.plugin.text_domain.clone(),
            include: Vec::new(),
            exclude: SCAN_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            project: format!("{} {}", config.name, config.version),
        };

        let generated = self.generator.generate(&request).await;
        let outcome = generated.and_then(|()| replace_if_changed(&scratch, &catalog));
        if scratch.exists() {
            fs::remove_file(&scratch).at(&scratch)?;
        }
        outcome
    }
}

fn replace_if_changed(scratch: &Path, catalog: &Path) -> Result<CatalogOutcome> {
    let fresh = fs::read_to_string(scratch).at(scratch)?;
    let previous = fs::read_to_string(catalog).ok();

    if previous
        .as_deref()
        .is_some_and(|old| catalog_hash(old) == catalog_hash(&fresh))
    {
        debug!("Catalog keys unchanged: {:?}", catalog);
        return Ok(CatalogOutcome::Unchanged(catalog.to_path_buf()));
    }

    let stamp = chrono::Utc::now().format("%Y-%m-%d %H:%M+0000").to_string();
    write_atomic(catalog, stamp_creation_date(&fresh, &stamp).as_bytes())?;
    info!("Updated translation catalog {}", catalog.display());
    Ok(CatalogOutcome::Written(catalog.to_path_buf()))
}

/// md5 over the sorted, deduplicated message keys
pub fn catalog_hash(pot: &str) -> String {
    let mut digest = md5::Context::new();
    for (context, id, plural) in message_keys(pot) {
        digest.consume(context.as_deref().unwrap_or("").as_bytes());
        digest.consume([0u8]);
        digest.consume(id.as_bytes());
        digest.consume([0u8]);
        digest.consume(plural.as_deref().unwrap_or("").as_bytes());
        digest.consume([b'\n']);
    }
    format!("{:x}", digest.compute())
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Context,
    Id,
    Plural,
    Other,
}

fn message_keys(pot: &str) -> BTreeSet<MessageKey> {
    let mut keys = BTreeSet::new();
    let mut context: Option<String> = None;
    let mut id: Option<String> = None;
    let mut plural: Option<String> = None;
    let mut field = Field::Other;

    let mut flush = |context: &mut Option<String>, id: &mut Option<String>, plural: &mut Option<String>| {
        if let Some(id) = id.take() {
            // Header entry
            if !id.is_empty() {
                keys.insert((context.take(), id, plural.take()));
            }
        }
        *context = None;
        *plural = None;
    };

    for line in pot.lines().map(str::trim) {
        if line.is_empty() {
            flush(&mut context, &mut id, &mut plural);
            field = Field::Other;
        } else if line.starts_with('#') {
            continue;
        } else if let Some(rest) = line.strip_prefix("msgctxt ") {
            flush(&mut context, &mut id, &mut plural);
            context = Some(unquote(rest));
            field = Field::Context;
        } else if let Some(rest) = line.strip_prefix("msgid_plural ") {
            plural = Some(unquote(rest));
            field = Field::Plural;
        } else if let Some(rest) = line.strip_prefix("msgid ") {
            if id.is_some() {
                flush(&mut context, &mut id, &mut plural);
            }
            id = Some(unquote(rest));
            field = Field::Id;
        } else if line.starts_with("msgstr") {
            field = Field::Other;
        } else if line.starts_with('"') {
            let target = match field {
                Field::Context => context.as_mut(),
                Field::Id => id.as_mut(),
                Field::Plural => plural.as_mut(),
                Field::Other => None,
            };
            if let Some(value) = target {
                value.push_str(&unquote(line));
            }
        }
    }
    flush(&mut context, &mut id, &mut plural);
    keys
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    inner.replace("\\\"", "\"").replace("\\n", "\n").replace("\\\\", "\\")
}

/// Set the `POT-Creation-Date` header, adding it when absent
fn stamp_creation_date(pot: &str, stamp: &str) -> String {
    let header = format!("\"POT-Creation-Date: {stamp}\\n\"");
    let mut replaced = false;
    let mut lines: Vec<String> = pot
        .lines()
        .map(|line| {
            if !replaced && line.starts_with("\"POT-Creation-Date:") {
                replaced = true;
                header.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !replaced {
        if let Some(pos) = lines.iter().position(|l| l.starts_with("msgstr \"\"")) {
            lines.insert(pos + 1, header);
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
