use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding segment.
///
/// Does not touch the filesystem, so symlinks are not followed. A `..` at
/// the root stays at the root; a leading `..` on a relative path is kept.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(segment) => out.push(segment),
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Append `ext` (e.g. `".js"`) to the final segment of `path`.
///
/// Unlike [`Path::with_extension`], an existing extension is kept:
/// `lib/foo.min` becomes `lib/foo.min.js`.
#[must_use]
pub fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(ext);
    PathBuf::from(s)
}

/// Comparison key for `path` on a case-insensitive filesystem: the same
/// path with ASCII letters lowercased.
#[must_use]
pub fn fold_case(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_ascii_lowercase())
}
