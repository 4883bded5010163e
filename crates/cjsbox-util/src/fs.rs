use crate::path::normalize;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of an existing filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Synchronous, read-only view of a filesystem.
///
/// This is everything the resolver and the module loader need: existence
/// checks, file reads and one canonicalization rule. Both the resolver's
/// results and the module cache's keys go through [`FileSystem::canonicalize`],
/// so two spellings of the same file can never produce two cache entries.
pub trait FileSystem: Debug {
    /// Stat a path. `None` if nothing exists there.
    fn stat(&self, path: &Path) -> Option<FileKind>;

    /// Read a file's contents as text.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Whether path comparison is case sensitive.
    fn case_sensitive(&self) -> bool;

    /// Canonical spelling of `path`. Never fails: paths that do not exist
    /// are normalized lexically.
    fn canonicalize(&self, path: &Path) -> PathBuf;

    fn is_file(&self, path: &Path) -> bool {
        self.stat(path) == Some(FileKind::File)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.stat(path) == Some(FileKind::Directory)
    }
}

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// The host operating system's filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn stat(&self, path: &Path) -> Option<FileKind> {
        let meta = fs::metadata(path).ok()?;
        if meta.is_file() {
            Some(FileKind::File)
        } else if meta.is_dir() {
            Some(FileKind::Directory)
        } else {
            None
        }
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        read_to_string_lossy(path)
    }

    fn case_sensitive(&self) -> bool {
        !cfg!(any(windows, target_os = "macos"))
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        // dunce keeps Windows paths out of the `\\?\` verbatim form
        dunce::canonicalize(path).unwrap_or_else(|_| normalize(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_to_string_lossy_valid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        // Valid start, then invalid continuation bytes
        file.write_all(&[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x80, 0x81])
            .unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("Hello"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_os_fs_stat() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.js");
        fs::write(&file, "x").unwrap();

        assert_eq!(OsFs.stat(dir.path()), Some(FileKind::Directory));
        assert_eq!(OsFs.stat(&file), Some(FileKind::File));
        assert_eq!(OsFs.stat(&dir.path().join("missing")), None);
        assert!(OsFs.is_file(&file));
        assert!(!OsFs.is_dir(&file));
    }

    #[test]
    fn test_os_fs_canonicalize_existing_and_missing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.js");
        fs::write(&file, "x").unwrap();

        let root = OsFs.canonicalize(dir.path());
        let via_dot = dir.path().join(".").join("a.js");
        assert_eq!(OsFs.canonicalize(&via_dot), root.join("a.js"));

        let missing = dir.path().join("sub").join("..").join("nope.js");
        assert_eq!(
            OsFs.canonicalize(&missing),
            normalize(&dir.path().join("nope.js"))
        );
    }

    #[test]
    fn test_os_fs_read_missing_file_errors() {
        let dir = tempdir().unwrap();
        let err = OsFs
            .read_to_string(&dir.path().join("missing.js"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
