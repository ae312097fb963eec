//! Filesystem access used by operations.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// The filesystem primitives operations need. Swapped out in tests.
pub trait FileSystem: Send + Sync {
    /// Copy `src` to `dest` and return the bytes written.
    ///
    /// With `overwrite == false` an existing `dest` is an `AlreadyExists` error
    /// and is left untouched.
    fn copy(&self, src: &Path, dest: &Path, overwrite: bool) -> io::Result<u64>;

    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Files directly inside `dir` whose extension matches, case-insensitively.
    fn list_by_extension(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn copy(&self, src: &Path, dest: &Path, overwrite: bool) -> io::Result<u64> {
        if overwrite {
            return fs::copy(src, dest);
        }
        let mut reader = File::open(src)?;
        // create_new fails atomically if dest already exists
        let mut writer = OpenOptions::new().write(true).create_new(true).open(dest)?;
        let written = io::copy(&mut reader, &mut writer)?;
        writer.sync_all()?;
        Ok(written)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn list_by_extension(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
        let wanted = extension.trim_start_matches('.');
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let matches = path
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
                .unwrap_or(false);
            if matches && path.is_file() {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_without_overwrite_keeps_existing() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dest = tmp.path().join("b.txt");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        let err = LocalFileSystem.copy(&src, &dest, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dest).unwrap(), b"old");

        assert_eq!(LocalFileSystem.copy(&src, &dest, true).unwrap(), 3);
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_list_by_extension() {
        let tmp = TempDir::new().unwrap();
        for name in ["b.JPG", "a.jpg", "notes.txt"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        fs::create_dir(tmp.path().join("dir.jpg")).unwrap();

        let found = LocalFileSystem.list_by_extension(tmp.path(), ".jpg").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.JPG"]);
    }
}
