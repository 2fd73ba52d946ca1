//! Small filesystem helpers shared by the compilers, synchronizer and packager

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};

/// Hidden-file marker check on a single path component
pub fn is_hidden_name(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Whether any component of `relative` is hidden
pub fn has_hidden_component(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| is_hidden_name(c.as_os_str()))
}

/// Write through a temporary sibling and rename it into place, so readers
/// never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Other(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(parent).at(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".wpbuild-")
        .tempfile_in(parent)
        .at(parent)?;
    temp.write_all(contents).at(temp.path())?;
    temp.as_file().sync_all().at(temp.path())?;
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Move a file, falling back to copy + remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).at(to)?;
    fs::remove_file(from).at(from)?;
    Ok(())
}

/// Whether `dest` already holds exactly the bytes of `source`.
pub fn same_contents(source: &Path, dest: &Path) -> Result<bool> {
    let source_meta = fs::metadata(source).at(source)?;
    let dest_meta = match fs::metadata(dest) {
        Ok(meta) => meta,
        Err(_) => return Ok(false),
    };
    if !dest_meta.is_file() || source_meta.len() != dest_meta.len() {
        return Ok(false);
    }
    Ok(fs::read(source).at(source)? == fs::read(dest).at(dest)?)
}

/// Copy unless the destination is already identical. Returns whether a
/// write happened.
pub fn copy_if_changed(source: &Path, dest: &Path) -> Result<bool> {
    if same_contents(source, dest)? {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    fs::copy(source, dest).at(dest)?;
    Ok(true)
}

/// Write unless the file already holds `contents`. Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<bool> {
    if fs::read(path).is_ok_and(|existing| existing == contents) {
        return Ok(false);
    }
    write_atomic(path, contents)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hidden_components() {
        assert!(has_hidden_component(Path::new(".git/config")));
        assert!(has_hidden_component(Path::new("assets/.DS_Store")));
        assert!(!has_hidden_component(Path::new("assets/lib/demo.js")));
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a/b/file.txt");

        write_atomic(&target, b"hello").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        // No temp files left behind
        assert_eq!(fs::read_dir(temp.path().join("a/b")).unwrap().count(), 1);
    }

    #[test]
    fn test_copy_if_changed() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.php");
        let dest = temp.path().join("out/source.php");
        fs::write(&source, "<?php echo 1;").unwrap();

        assert!(copy_if_changed(&source, &dest).unwrap());
        assert!(!copy_if_changed(&source, &dest).unwrap());

        fs::write(&source, "<?php echo 2;").unwrap();
        assert!(copy_if_changed(&source, &dest).unwrap());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "<?php echo 2;");
    }

    #[test]
    fn test_move_file() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("staged.js");
        let to = temp.path().join("lib/final.js");
        fs::write(&from, "x").unwrap();
        fs::create_dir_all(temp.path().join("lib")).unwrap();
        fs::write(&to, "old").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "x");
    }
}
