use crate::fs::FileSystem;
use std::path::{Path, PathBuf};

/// First free `<stem>.<ext>`, `<stem>-1.<ext>`, `<stem>-2.<ext>`, ... in `dir`.
pub fn unique_path(fs: &dyn FileSystem, dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let first = dir.join(format!("{}.{}", stem, extension));
    if !fs.exists(&first) {
        return first;
    }
    let mut n: u64 = 1;
    loop {
        let candidate = dir.join(format!("{}-{}.{}", stem, n, extension));
        if !fs.exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// File stem of `path`, or `fallback` when it has none.
pub fn stem_or<'a>(path: &'a Path, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    path.file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or(std::borrow::Cow::Borrowed(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use tempfile::TempDir;

    #[test]
    fn test_unique_path_skips_taken_names() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();

        assert_eq!(
            unique_path(&LocalFileSystem, dir, "survey", "ddb"),
            dir.join("survey.ddb")
        );

        std::fs::write(dir.join("survey.ddb"), b"").unwrap();
        std::fs::write(dir.join("survey-1.ddb"), b"").unwrap();
        assert_eq!(
            unique_path(&LocalFileSystem, dir, "survey", "ddb"),
            dir.join("survey-2.ddb")
        );
        // other extensions are independent
        assert_eq!(
            unique_path(&LocalFileSystem, dir, "survey", "tdb"),
            dir.join("survey.tdb")
        );
    }

    #[test]
    fn test_stem_or() {
        assert_eq!(stem_or(Path::new("/x/master.ddb"), "data"), "master");
        assert_eq!(stem_or(Path::new("/"), "data"), "data");
    }
}
