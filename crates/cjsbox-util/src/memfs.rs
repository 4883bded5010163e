//! In-memory filesystem.
//!
//! Used to hand a module graph to a sandbox without touching the host disk,
//! and as the fixture backend for tests.

use crate::fs::{read_to_string_lossy, FileKind, FileSystem};
use crate::path::{fold_case, normalize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
enum Entry {
    File(String),
    Directory,
}

#[derive(Debug, Clone)]
struct Node {
    /// Spelling the node was created with.
    path: PathBuf,
    entry: Entry,
}

/// A static tree of files and directories held in memory.
///
/// Inserting a file creates its missing parent directories.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    nodes: BTreeMap<PathBuf, Node>,
    case_sensitive: bool,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty, case-sensitive filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            case_sensitive: true,
        }
    }

    /// Switch path comparison to case-insensitive (ASCII folding).
    ///
    /// Existing nodes are re-keyed; when two spellings collide the later
    /// one wins.
    #[must_use]
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        let nodes = std::mem::take(&mut self.nodes);
        for node in nodes.into_values() {
            let key = self.key(&node.path);
            self.nodes.insert(key, node);
        }
        self
    }

    /// Builder form of [`MemoryFs::insert_file`].
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert_file(path, contents);
        self
    }

    /// Add (or overwrite) a file.
    pub fn insert_file(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        let path = normalize(path.as_ref());
        if let Some(parent) = path.parent() {
            self.insert_dir(parent);
        }
        let key = self.key(&path);
        self.nodes.insert(
            key,
            Node {
                path,
                entry: Entry::File(contents.into()),
            },
        );
    }

    /// Add a directory and all of its missing ancestors.
    pub fn insert_dir(&mut self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        for dir in path.ancestors() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let key = self.key(dir);
            self.nodes.entry(key).or_insert_with(|| Node {
                path: dir.to_path_buf(),
                entry: Entry::Directory,
            });
        }
    }

    /// Copy a directory tree from the host filesystem.
    ///
    /// Paths keep the spelling of `root`. File contents are read lossily.
    ///
    /// # Errors
    /// Returns an error if the tree cannot be walked or a file cannot be read.
    pub fn snapshot(root: &Path) -> io::Result<Self> {
        let mut fs = Self::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_dir() {
                fs.insert_dir(entry.path());
            } else if entry.file_type().is_file() {
                let contents = read_to_string_lossy(entry.path())?;
                fs.insert_file(entry.path(), contents);
            }
        }
        Ok(fs)
    }

    /// Number of files (directories excluded).
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n.entry, Entry::File(_)))
            .count()
    }

    fn key(&self, path: &Path) -> PathBuf {
        let normalized = normalize(path);
        if self.case_sensitive {
            normalized
        } else {
            fold_case(&normalized)
        }
    }

    fn node(&self, path: &Path) -> Option<&Node> {
        self.nodes.get(&self.key(path))
    }
}

impl FileSystem for MemoryFs {
    fn stat(&self, path: &Path) -> Option<FileKind> {
        self.node(path).map(|node| match node.entry {
            Entry::File(_) => FileKind::File,
            Entry::Directory => FileKind::Directory,
        })
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.node(path) {
            Some(Node {
                entry: Entry::File(contents),
                ..
            }) => Ok(contents.clone()),
            Some(_) => Err(io::Error::other(format!("EISDIR: {}", path.display()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("ENOENT: {}", path.display()),
            )),
        }
    }

    fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        self.node(path)
            .map_or_else(|| normalize(path), |node| node.path.clone())
    }
}
