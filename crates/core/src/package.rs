//! Distributable ZIP archive of the assembled plugin

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::config::ResolvedConfig;
use crate::error::{Error, IoResultExt, Result};
use crate::fsutil::has_hidden_component;
use crate::paths::Paths;
use crate::sync::walk_error;

const COMPRESSION_LEVEL: i64 = 9;

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::Packaging(e.to_string())
}

/// `a/b/c.php` with forward slashes regardless of platform
fn entry_name(root: &str, relative: &Path) -> String {
    std::iter::once(root.to_string())
        .chain(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned()),
        )
        .collect::<Vec<_>>()
        .join("/")
}

pub struct Packager;

impl Packager {
    /// Archive the plugin destination into `<dist>/<package>.zip`.
    pub fn archive(config: &ResolvedConfig) -> Result<PathBuf> {
        let paths = Paths::auto(config);
        let plugin_dir = paths
            .plugin_destination()
            .ok_or_else(|| Error::Packaging("no dist folder for this build".into()))?;
        Self::archive_dir(&plugin_dir, &config.plugin.package_name, &paths.archive_path())
    }

    /// Zip `plugin_dir` under a top-level `<package_name>/` folder. The archive
    /// is written next to `archive` and renamed into place once complete.
    pub fn archive_dir(plugin_dir: &Path, package_name: &str, archive: &Path) -> Result<PathBuf> {
        if !plugin_dir.is_dir() {
            return Err(Error::MissingPluginDirectory(plugin_dir.to_path_buf()));
        }

        let mut partial = archive.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        match Self::write_archive(plugin_dir, package_name, &partial) {
            Ok(files) => {
                fs::rename(&partial, archive).at(archive)?;
                info!("Packaged {} file(s) into {}", files, archive.display());
                Ok(archive.to_path_buf())
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }

    fn write_archive(plugin_dir: &Path, package_name: &str, partial: &Path) -> Result<usize> {
        if let Some(parent) = partial.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        let file = File::create(partial).at(partial)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL));

        zip.add_directory(format!("{package_name}/"), options)
            .map_err(zip_error)?;

        let mut files = 0;
        for entry in WalkDir::new(plugin_dir)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| walk_error(plugin_dir, e))?;
            let relative = entry
                .path()
                .strip_prefix(plugin_dir)
                .map_err(|e| Error::Other(e.to_string()))?;
            if has_hidden_component(relative) {
                continue;
            }
            let name = entry_name(package_name, relative);

            if entry.file_type().is_dir() {
                zip.add_directory(format!("{name}/"), options)
                    .map_err(zip_error)?;
            } else if entry.file_type().is_file() {
                debug!("Adding {}", name);
                zip.start_file(name, options).map_err(zip_error)?;
                let mut source = File::open(entry.path()).at(entry.path())?;
                io::copy(&mut source, &mut zip).at(entry.path())?;
                files += 1;
            }
        }

        let mut file = zip.finish().map_err(zip_error)?;
        file.flush().at(partial)?;
        file.sync_all().at(partial)?;
        Ok(files)
    }
}
