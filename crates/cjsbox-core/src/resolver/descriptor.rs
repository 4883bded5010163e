//! Package descriptor cache.
//!
//! Memoizes the parsed `package.json` (or configured manifest) of each
//! directory for the lifetime of one resolver. Only the fields resolution
//! cares about are kept: `name`, `main` and `browser`.

use cjsbox_util::path::fold_case;
use cjsbox_util::FileSystem;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::trace;

/// Replacement named by a `browser` field entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserTarget {
    /// Load this path (relative to the package) or bare specifier instead.
    Path(String),
    /// `false`: the request receives an empty exports object.
    Stub,
}

impl BrowserTarget {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::Path(s.clone())),
            Value::Bool(false) => Some(Self::Stub),
            _ => None,
        }
    }
}

/// Parsed `browser` field.
///
/// Keys starting with `./`, `../` or `/` name files of the package and are
/// stored as absolute paths, compared the way the filesystem compares
/// paths. Every other key is a bare module specifier.
#[derive(Debug, Clone)]
pub struct BrowserMap {
    main: Option<BrowserTarget>,
    /// Comparison key to (canonical spelling, target).
    files: HashMap<PathBuf, (PathBuf, BrowserTarget)>,
    modules: HashMap<String, BrowserTarget>,
    case_sensitive: bool,
}

impl Default for BrowserMap {
    fn default() -> Self {
        Self {
            main: None,
            files: HashMap::new(),
            modules: HashMap::new(),
            case_sensitive: true,
        }
    }
}

impl BrowserMap {
    fn parse(fs: &dyn FileSystem, directory: &Path, value: Option<&Value>) -> Self {
        let mut map = Self {
            case_sensitive: fs.case_sensitive(),
            ..Self::default()
        };

        match value {
            // "browser": "./browser.js" replaces main
            Some(Value::String(_)) => map.main = value.and_then(BrowserTarget::from_json),
            Some(Value::Object(entries)) => {
                for (key, target) in entries {
                    let Some(target) = BrowserTarget::from_json(target) else {
                        continue;
                    };
                    if is_file_key(key) {
                        let path = fs.canonicalize(&directory.join(key));
                        let key = map.file_key(&path);
                        map.files.insert(key, (path, target));
                    } else {
                        map.modules.insert(key.clone(), target);
                    }
                }
            }
            _ => {}
        }

        map
    }

    /// Replacement for the package's main entry (string-valued field).
    #[must_use]
    pub fn main(&self) -> Option<&BrowserTarget> {
        self.main.as_ref()
    }

    /// Entry for an absolute, canonical file path inside the package.
    #[must_use]
    pub fn file(&self, path: &Path) -> Option<&BrowserTarget> {
        self.files.get(&self.file_key(path)).map(|(_, target)| target)
    }

    /// Entry for a bare module specifier.
    #[must_use]
    pub fn module(&self, specifier: &str) -> Option<&BrowserTarget> {
        self.modules.get(specifier)
    }

    /// File entries, keyed by absolute path. Unordered.
    pub fn files(&self) -> impl Iterator<Item = (&Path, &BrowserTarget)> {
        self.files.values().map(|(path, target)| (path.as_path(), target))
    }

    /// Module entries, keyed by specifier. Unordered.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &BrowserTarget)> {
        self.modules.iter().map(|(name, target)| (name.as_str(), target))
    }

    #[must_use]
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.main.is_none() && self.files.is_empty() && self.modules.is_empty()
    }

    fn file_key(&self, path: &Path) -> PathBuf {
        if self.case_sensitive {
            path.to_path_buf()
        } else {
            fold_case(path)
        }
    }
}

fn is_file_key(key: &str) -> bool {
    key.starts_with("./") || key.starts_with("../") || key.starts_with('/')
}

/// The resolution-relevant view of one package manifest.
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    /// Directory containing the manifest.
    pub directory: PathBuf,
    pub name: Option<String>,
    pub main: Option<String>,
    pub browser: BrowserMap,
}

impl PackageDescriptor {
    /// Build a descriptor from parsed manifest JSON.
    ///
    /// Returns `None` when the manifest root is not an object.
    #[must_use]
    pub fn from_json(fs: &dyn FileSystem, directory: &Path, value: &Value) -> Option<Self> {
        let manifest = value.as_object()?;
        let string_field = |field: &str| {
            manifest
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            directory: directory.to_path_buf(),
            name: string_field("name"),
            main: string_field("main"),
            browser: BrowserMap::parse(fs, directory, manifest.get("browser")),
        })
    }
}

/// Per-directory memo of package descriptors.
///
/// Absence is memoized too: a directory without a (valid) manifest is
/// probed once. There is no invalidation.
#[derive(Debug)]
pub struct DescriptorCache {
    manifest: String,
    entries: RefCell<HashMap<PathBuf, Option<Rc<PackageDescriptor>>>>,
}

impl DescriptorCache {
    /// Create an empty cache reading manifests named `manifest`.
    #[must_use]
    pub fn new(manifest: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Descriptor for the manifest directly inside `directory`, if any.
    ///
    /// A missing, unreadable or malformed manifest yields `None`.
    pub fn describe(
        &self,
        fs: &dyn FileSystem,
        directory: &Path,
    ) -> Option<Rc<PackageDescriptor>> {
        if let Some(cached) = self.entries.borrow().get(directory) {
            return cached.clone();
        }

        let descriptor = read_descriptor(fs, directory, &self.manifest).map(Rc::new);
        self.entries
            .borrow_mut()
            .insert(directory.to_path_buf(), descriptor.clone());
        descriptor
    }

    /// Descriptor of the package containing `start`: the first manifest
    /// found walking `start` and then each of its ancestors.
    pub fn nearest(&self, fs: &dyn FileSystem, start: &Path) -> Option<Rc<PackageDescriptor>> {
        start.ancestors().find_map(|dir| self.describe(fs, dir))
    }

    /// Number of directories probed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

fn read_descriptor(fs: &dyn FileSystem, directory: &Path, manifest: &str) -> Option<PackageDescriptor> {
    let path = directory.join(manifest);
    if !fs.is_file(&path) {
        return None;
    }

    let content = match fs.read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            trace!(path = %path.display(), error = %e, "Unreadable manifest, ignoring");
            return None;
        }
    };

    let value: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            trace!(path = %path.display(), error = %e, "Malformed manifest, ignoring");
            return None;
        }
    };

    PackageDescriptor::from_json(fs, directory, &value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cjsbox_util::MemoryFs;

    fn cache() -> DescriptorCache {
        DescriptorCache::new("package.json")
    }

    #[test]
    fn test_describe_reads_main() {
        let fs = MemoryFs::new().with_file(
            "/p/package.json",
            r#"{"name": "p", "main": "lib/entry.js"}"#,
        );

        let desc = cache().describe(&fs, Path::new("/p")).unwrap();
        assert_eq!(desc.directory, PathBuf::from("/p"));
        assert_eq!(desc.name.as_deref(), Some("p"));
        assert_eq!(desc.main.as_deref(), Some("lib/entry.js"));
        assert!(desc.browser.is_empty());
    }

    #[test]
    fn test_missing_manifest_is_absent() {
        let fs = MemoryFs::new().with_file("/p/index.js", "");
        assert!(cache().describe(&fs, Path::new("/p")).is_none());
    }

    #[test]
    fn test_malformed_manifest_is_absent() {
        let fs = MemoryFs::new().with_file("/p/package.json", "{ broken");
        assert!(cache().describe(&fs, Path::new("/p")).is_none());
    }

    #[test]
    fn test_non_object_manifest_is_absent() {
        let fs = MemoryFs::new().with_file("/p/package.json", "[1, 2]");
        assert!(cache().describe(&fs, Path::new("/p")).is_none());
    }

    #[test]
    fn test_non_string_main_is_ignored() {
        let fs = MemoryFs::new().with_file("/p/package.json", r#"{"main": 42}"#);
        let desc = cache().describe(&fs, Path::new("/p")).unwrap();
        assert!(desc.main.is_none());
    }

    #[test]
    fn test_results_are_memoized() {
        let fs = MemoryFs::new().with_file("/p/package.json", r#"{"main": "a.js"}"#);
        let cache = cache();

        let first = cache.describe(&fs, Path::new("/p")).unwrap();
        let second = cache.describe(&fs, Path::new("/p")).unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        assert!(cache.describe(&fs, Path::new("/q")).is_none());
        assert!(cache.describe(&fs, Path::new("/q")).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_browser_string_replaces_main() {
        let fs = MemoryFs::new().with_file(
            "/p/package.json",
            r#"{"main": "node.js", "browser": "./browser.js"}"#,
        );

        let desc = cache().describe(&fs, Path::new("/p")).unwrap();
        assert_eq!(
            desc.browser.main(),
            Some(&BrowserTarget::Path("./browser.js".to_string()))
        );
    }

    #[test]
    fn test_browser_map_splits_files_and_modules() {
        let fs = MemoryFs::new().with_file(
            "/p/package.json",
            r#"{
                "browser": {
                    "./lib/server.js": "./lib/client.js",
                    "./lib/fs.js": false,
                    "fs": false,
                    "http": "stream-http",
                    "ignored": true
                }
            }"#,
        );

        let desc = cache().describe(&fs, Path::new("/p")).unwrap();
        let browser = &desc.browser;
        assert!(browser.has_files());
        assert_eq!(
            browser.file(Path::new("/p/lib/server.js")),
            Some(&BrowserTarget::Path("./lib/client.js".to_string()))
        );
        assert_eq!(browser.file(Path::new("/p/lib/fs.js")), Some(&BrowserTarget::Stub));
        assert_eq!(browser.module("fs"), Some(&BrowserTarget::Stub));
        assert_eq!(
            browser.module("http"),
            Some(&BrowserTarget::Path("stream-http".to_string()))
        );
        assert!(browser.module("ignored").is_none());
        assert_eq!(browser.files().count(), 2);
        assert_eq!(browser.modules().count(), 2);
    }

    #[test]
    fn test_browser_file_keys_fold_case_on_insensitive_fs() {
        let fs = MemoryFs::new()
            .with_file("/p/package.json", r#"{"browser": {"./Optional.js": false}}"#)
            .case_insensitive();

        let desc = cache().describe(&fs, Path::new("/p")).unwrap();
        assert_eq!(desc.browser.file(Path::new("/p/optional.js")), Some(&BrowserTarget::Stub));
        assert_eq!(desc.browser.file(Path::new("/p/OPTIONAL.JS")), Some(&BrowserTarget::Stub));
        let (listed, _) = desc.browser.files().next().unwrap();
        assert_eq!(listed, Path::new("/p/Optional.js"));
    }

    #[test]
    fn test_browser_file_keys_keep_case_on_sensitive_fs() {
        let fs = MemoryFs::new()
            .with_file("/p/package.json", r#"{"browser": {"./Optional.js": false}}"#);

        let desc = cache().describe(&fs, Path::new("/p")).unwrap();
        assert!(desc.browser.file(Path::new("/p/optional.js")).is_none());
        assert_eq!(desc.browser.file(Path::new("/p/Optional.js")), Some(&BrowserTarget::Stub));
    }

    #[test]
    fn test_nearest_walks_up() {
        let fs = MemoryFs::new()
            .with_file("/p/package.json", r#"{"name": "outer"}"#)
            .with_file("/p/src/deep/file.js", "");

        let cache = cache();
        let desc = cache.nearest(&fs, Path::new("/p/src/deep")).unwrap();
        assert_eq!(desc.name.as_deref(), Some("outer"));
        assert!(cache.nearest(&fs, Path::new("/elsewhere")).is_none());
    }
}
