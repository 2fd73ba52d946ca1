//! Script compilation
//!
//! Every format of one compile call is bundled into a hidden staging
//! directory first. Only when all of them succeeded are the files moved into
//! their final locations, so a failed rebuild leaves the previous output
//! untouched.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::ResolvedConfig;
use crate::error::{Error, IoResultExt, Result};
use crate::fsutil::move_file;

use super::banner::{banner, line_count};
use super::sourcemap::{shift_source_map, strip_source_mapping_url};
use super::umd;
use super::{AssetKind, Bundler, CompilationTarget, OutputFormat, OutputLocation, formats_for};

/// A file produced in staging and its final destination
#[derive(Debug)]
struct Staged {
    from: PathBuf,
    to: PathBuf,
}

#[derive(Debug, Default)]
struct Staging {
    files: Vec<Staged>,
    /// Entry file of each format, in format order
    entries: Vec<PathBuf>,
    /// Chunk directory and the chunk files it should contain after commit
    chunks: Option<(PathBuf, HashSet<PathBuf>)>,
}

pub struct ScriptCompiler<B> {
    bundler: B,
}

impl<B: Bundler> ScriptCompiler<B> {
    pub fn new(bundler: B) -> Self {
        Self { bundler }
    }

    /// Build every applicable format. Returns the entry file of each format,
    /// the self-executing bundle first.
    pub async fn compile(&self, config: &ResolvedConfig, is_dev: bool) -> Result<Vec<PathBuf>> {
        let library = config.paths.library_assets.as_path();
        fs::create_dir_all(library).at(library)?;
        let staging_dir = tempfile::Builder::new()
            .prefix(".wpbuild-scripts-")
            .tempdir_in(library)
            .at(library)?;

        let header = banner(config);
        let mut staging = Staging::default();

        for format in formats_for(config, is_dev) {
            let Some(target) = CompilationTarget::derive(config, is_dev, format) else {
                debug!("Skipping {:?} output: no destination for this build", format);
                continue;
            };
            let stage_root = staging_dir.path().join(format.esbuild_format());
            match format {
                OutputFormat::NativeModule => {
                    self.stage_split(&target, &stage_root, &header, &mut staging)
                        .await?
                }
                OutputFormat::SelfExecuting | OutputFormat::CommonJs => {
                    self.stage_single(&target, &stage_root, &header, &mut staging)
                        .await?
                }
            }
        }

        Self::commit(staging)
    }

    async fn stage_single(
        &self,
        target: &CompilationTarget,
        stage_root: &Path,
        header: &str,
        staging: &mut Staging,
    ) -> Result<()> {
        let OutputLocation::File(final_path) = &target.output else {
            return Err(Error::Other("single-file format without an output file".into()));
        };
        let file_name = final_path
            .file_name()
            .ok_or_else(|| Error::Other(format!("invalid output path {}", final_path.display())))?;

        fs::create_dir_all(stage_root).at(stage_root)?;
        let staged = stage_root.join(file_name);
        self.bundler
            .bundle(&target.with_output(OutputLocation::File(staged.clone())))
            .await?;

        let body = fs::read_to_string(&staged)
            .map_err(|_| Error::compile(AssetKind::Script, "bundler produced no output file"))?;
        let body = strip_source_mapping_url(&body);

        let (mut code, prefix_lines) = match target.format {
            OutputFormat::SelfExecuting => {
                let global = target.global_name.as_deref().unwrap_or("Library");
                let wrapped = umd::wrap(&body, global, &target.externals);
                (
                    format!("{header}{}", wrapped.code),
                    line_count(header) + wrapped.prefix_lines,
                )
            }
            _ => (format!("{header}{}\n", body.trim_end()), line_count(header)),
        };

        let staged_map = map_path(&staged);
        if target.sourcemap && staged_map.is_file() {
            let map = fs::read_to_string(&staged_map).at(&staged_map)?;
            fs::write(&staged_map, shift_source_map(&map, prefix_lines)?).at(&staged_map)?;
            code.push_str(&format!(
                "//# sourceMappingURL={}.map\n",
                file_name.to_string_lossy()
            ));
            staging.files.push(Staged {
                from: staged_map,
                to: map_path(final_path),
            });
        }

        fs::write(&staged, code).at(&staged)?;
        staging.files.push(Staged {
            from: staged,
            to: final_path.clone(),
        });
        staging.entries.push(final_path.clone());
        Ok(())
    }

    async fn stage_split(
        &self,
        target: &CompilationTarget,
        stage_root: &Path,
        header: &str,
        staging: &mut Staging,
    ) -> Result<()> {
        let OutputLocation::Directory {
            dir,
            entry_name,
            chunk_dir,
        } = &target.output
        else {
            return Err(Error::Other("code-split format without an output directory".into()));
        };

        fs::create_dir_all(stage_root).at(stage_root)?;
        self.bundler
            .bundle(&target.with_output(OutputLocation::Directory {
                dir: stage_root.to_path_buf(),
                entry_name: entry_name.clone(),
                chunk_dir: chunk_dir.clone(),
            }))
            .await?;

        let entry = stage_root.join(format!("{entry_name}.js"));
        let code = fs::read_to_string(&entry)
            .map_err(|_| Error::compile(AssetKind::Script, "bundler produced no entry chunk"))?;
        // Only the entry carries the banner so chunk hashes survive version bumps
        fs::write(&entry, format!("{header}{code}")).at(&entry)?;
        let entry_map = map_path(&entry);
        if entry_map.is_file() {
            let map = fs::read_to_string(&entry_map).at(&entry_map)?;
            fs::write(&entry_map, shift_source_map(&map, line_count(header))?).at(&entry_map)?;
        }

        let final_chunks = dir.join(chunk_dir);
        let mut keep = HashSet::new();
        for file in WalkDir::new(stage_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = file
                .path()
                .strip_prefix(stage_root)
                .map_err(|e| Error::Other(e.to_string()))?;
            let to = dir.join(relative);
            if to.starts_with(&final_chunks) {
                keep.insert(to.clone());
            }
            staging.files.push(Staged {
                from: file.path().to_path_buf(),
                to,
            });
        }

        staging.entries.push(dir.join(format!("{entry_name}.js")));
        staging.chunks = Some((final_chunks, keep));
        Ok(())
    }

    fn commit(staging: Staging) -> Result<Vec<PathBuf>> {
        for file in &staging.files {
            move_file(&file.from, &file.to)?;
        }

        if let Some((chunk_dir, keep)) = &staging.chunks {
            prune_stale_chunks(chunk_dir, keep)?;
        }

        info!("Compiled scripts: {} file(s) written", staging.files.len());
        Ok(staging.entries)
    }
}

fn map_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".map");
    PathBuf::from(name)
}

/// Remove chunk files left over from earlier builds
fn prune_stale_chunks(chunk_dir: &Path, keep: &HashSet<PathBuf>) -> Result<()> {
    let Ok(entries) = fs::read_dir(chunk_dir) else {
        return Ok(());
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && !keep.contains(&path) {
            debug!("Removing stale chunk {:?}", path);
            fs::remove_file(&path).at(&path)?;
        }
    }
    Ok(())
}
