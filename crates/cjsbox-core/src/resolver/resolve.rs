//! CommonJS path resolution.
//!
//! Supports:
//! - Relative specifiers: `./`, `../`, `.`, `..`
//! - Absolute filesystem specifiers
//! - Bare specifiers with package-root (`node_modules`) lookup
//! - Extension probing (appended, in configured order)
//! - Directory resolution (`package.json` main, then `index.*`)
//! - `browser` field remapping and stubbing

use super::descriptor::{BrowserTarget, DescriptorCache, PackageDescriptor};
use cjsbox_util::path::{append_extension, normalize};
use cjsbox_util::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace};

/// Default extensions for probing.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".json"];

/// Default package root directory names.
pub const DEFAULT_PACKAGE_ROOTS: &[&str] = &["node_modules"];

/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "package.json";

/// Maximum number of tried paths to record.
const MAX_TRIED_PATHS: usize = 20;

/// Resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Extensions to probe (in order).
    pub extensions: Vec<String>,
    /// Directory names searched for bare specifiers, per ancestor.
    pub package_roots: Vec<String>,
    /// Manifest file name.
    pub manifest: String,
    /// Apply `browser` field remapping.
    pub browser: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            package_roots: DEFAULT_PACKAGE_ROOTS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            manifest: DEFAULT_MANIFEST.to_string(),
            browser: true,
        }
    }
}

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A concrete, canonical file.
    Path(PathBuf),
    /// Load nothing; the caller receives an empty exports object.
    Stub,
    /// No candidate exists anywhere in the search space.
    Unresolved,
}

impl Resolution {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }
}

/// Reason codes for unresolved specifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveReasonCode {
    SpecifierInvalid,
    NotFound,
    PackageNotFound,
    /// A `browser` entry pointed at something that does not exist.
    BrowserTargetNotFound,
}

impl std::fmt::Display for ResolveReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SpecifierInvalid => "SPECIFIER_INVALID",
            Self::NotFound => "NOT_FOUND",
            Self::PackageNotFound => "PACKAGE_NOT_FOUND",
            Self::BrowserTargetNotFound => "BROWSER_TARGET_NOT_FOUND",
        };
        write!(f, "{s}")
    }
}

/// Resolution with diagnostics.
#[derive(Debug, Clone)]
pub struct ResolveResult {
    pub resolution: Resolution,
    /// Reason code if unresolved.
    pub reason: Option<ResolveReasonCode>,
    /// Candidate paths tried (capped).
    pub tried: Vec<PathBuf>,
}

impl ResolveResult {
    fn found(resolution: Resolution, tried: Vec<PathBuf>) -> Self {
        Self {
            resolution,
            reason: None,
            tried,
        }
    }

    fn unresolved(reason: ResolveReasonCode, tried: Vec<PathBuf>) -> Self {
        Self {
            resolution: Resolution::Unresolved,
            reason: Some(reason),
            tried,
        }
    }
}

/// Resolves specifiers against one static filesystem view.
///
/// Owns its descriptor cache; two resolvers never share manifests.
#[derive(Debug)]
pub struct Resolver {
    fs: Rc<dyn FileSystem>,
    config: ResolverConfig,
    descriptors: DescriptorCache,
}

impl Resolver {
    #[must_use]
    pub fn new(fs: Rc<dyn FileSystem>, config: ResolverConfig) -> Self {
        let descriptors = DescriptorCache::new(config.manifest.clone());
        Self {
            fs,
            config,
            descriptors,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    #[must_use]
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    #[must_use]
    pub fn descriptors(&self) -> &DescriptorCache {
        &self.descriptors
    }

    /// Descriptor for the manifest directly inside `directory`.
    pub fn describe(&self, directory: &Path) -> Option<Rc<PackageDescriptor>> {
        self.descriptors.describe(self.fs.as_ref(), directory)
    }

    /// Descriptor of the package containing `path`.
    pub fn nearest_package(&self, path: &Path) -> Option<Rc<PackageDescriptor>> {
        self.descriptors
            .nearest(self.fs.as_ref(), &self.fs.canonicalize(path))
    }

    /// Resolve `spec` from the directory `context`.
    ///
    /// `origin` names the requesting location when it differs from the
    /// context; relative `browser` remapping is looked up in the package
    /// containing it.
    #[must_use]
    pub fn resolve_from(&self, context: &Path, spec: &str, origin: Option<&Path>) -> Resolution {
        self.resolve(context, spec, origin).resolution
    }

    /// Like [`Resolver::resolve_from`], keeping the reason and tried candidates.
    #[must_use]
    pub fn resolve(&self, context: &Path, spec: &str, origin: Option<&Path>) -> ResolveResult {
        let mut tried = Vec::new();

        if spec.is_empty() {
            return ResolveResult::unresolved(ResolveReasonCode::SpecifierInvalid, tried);
        }

        let context = self.fs.canonicalize(context);
        let owner = origin.map_or_else(|| context.clone(), |o| self.fs.canonicalize(o));
        let scope = if self.config.browser {
            self.descriptors.nearest(self.fs.as_ref(), &owner)
        } else {
            None
        };

        let (outcome, miss) = if is_path_specifier(spec) {
            let target = normalize(&context.join(spec));
            (
                self.resolve_path(&target, scope.as_deref(), &mut tried),
                ResolveReasonCode::NotFound,
            )
        } else {
            (
                self.resolve_bare(&context, spec, scope.as_deref(), &mut tried),
                ResolveReasonCode::PackageNotFound,
            )
        };

        let result = match outcome {
            Some(Resolution::Unresolved) => {
                ResolveResult::unresolved(ResolveReasonCode::BrowserTargetNotFound, tried)
            }
            Some(resolution) => ResolveResult::found(resolution, tried),
            None => ResolveResult::unresolved(miss, tried),
        };

        trace!(
            specifier = spec,
            context = %context.display(),
            resolution = ?result.resolution,
            "Resolved specifier"
        );
        result
    }

    /// Resolve a file or directory path: exact file, then each extension
    /// appended, then the directory's main / index.
    fn resolve_path(
        &self,
        target: &Path,
        scope: Option<&PackageDescriptor>,
        tried: &mut Vec<PathBuf>,
    ) -> Option<Resolution> {
        if let Some(found) = self.resolve_file(target, scope, tried) {
            return Some(found);
        }

        if self.fs.is_dir(target) {
            return self.resolve_directory(target, scope, tried);
        }

        None
    }

    /// Exact file, then extension probing. `Some(Unresolved)` means a
    /// `browser` entry matched but its target is missing.
    fn resolve_file(
        &self,
        base: &Path,
        scope: Option<&PackageDescriptor>,
        tried: &mut Vec<PathBuf>,
    ) -> Option<Resolution> {
        let candidates = std::iter::once(base.to_path_buf()).chain(
            self.config
                .extensions
                .iter()
                .map(|ext| append_extension(base, ext)),
        );

        for candidate in candidates {
            if let Some(remapped) = self.remap_file(scope, &candidate, tried) {
                return Some(remapped);
            }

            add_tried(tried, &candidate);
            if self.fs.is_file(&candidate) {
                return Some(Resolution::Path(self.fs.canonicalize(&candidate)));
            }
        }

        None
    }

    /// Directory resolution: `browser` main string > `main` (file, then
    /// `main/index.*`) > `index.*`.
    fn resolve_directory(
        &self,
        dir: &Path,
        scope: Option<&PackageDescriptor>,
        tried: &mut Vec<PathBuf>,
    ) -> Option<Resolution> {
        let own = self.describe(dir);
        let local = if self.config.browser {
            own.as_deref().or(scope)
        } else {
            None
        };

        if let Some(pkg) = own.as_deref() {
            if self.config.browser {
                if let Some(target) = pkg.browser.main() {
                    debug!(package = %pkg.directory.display(), ?target, "Browser field replaces main");
                    return Some(self.apply_browser_target(pkg, target, TargetOf::Main, tried));
                }
            }

            if let Some(main) = &pkg.main {
                let main_path = normalize(&dir.join(main));
                if let Some(found) = self.resolve_file(&main_path, local, tried) {
                    return Some(found);
                }
                if main_path != dir {
                    if let Some(found) = self.resolve_index(&main_path, local, tried) {
                        return Some(found);
                    }
                }
            }
        }

        self.resolve_index(dir, local, tried)
    }

    fn resolve_index(
        &self,
        dir: &Path,
        scope: Option<&PackageDescriptor>,
        tried: &mut Vec<PathBuf>,
    ) -> Option<Resolution> {
        for ext in &self.config.extensions {
            let index = dir.join(format!("index{ext}"));

            if let Some(remapped) = self.remap_file(scope, &index, tried) {
                return Some(remapped);
            }

            add_tried(tried, &index);
            if self.fs.is_file(&index) {
                return Some(Resolution::Path(self.fs.canonicalize(&index)));
            }
        }

        None
    }

    /// Resolve a bare specifier by walking package roots of each ancestor,
    /// nearest first.
    fn resolve_bare(
        &self,
        context: &Path,
        spec: &str,
        scope: Option<&PackageDescriptor>,
        tried: &mut Vec<PathBuf>,
    ) -> Option<Resolution> {
        if let Some(pkg) = scope {
            if let Some(target) = pkg.browser.module(spec) {
                debug!(specifier = spec, package = %pkg.directory.display(), ?target, "Browser field remaps module");
                return Some(self.apply_browser_target(pkg, target, TargetOf::Module, tried));
            }
        }

        // e.g., "lodash/fp" -> "lodash", "@scope/pkg/sub" -> "@scope/pkg"
        let (pkg_name, subpath) = parse_bare_specifier(spec);

        for ancestor in context.ancestors() {
            // No node_modules/node_modules
            if self.is_package_root(ancestor) {
                continue;
            }

            for root in &self.config.package_roots {
                let pkg_dir = ancestor.join(root).join(pkg_name);
                add_tried(tried, &pkg_dir);

                if !self.fs.is_dir(&pkg_dir) {
                    continue;
                }

                let own = if self.config.browser {
                    self.describe(&pkg_dir)
                } else {
                    None
                };

                let found = match subpath {
                    Some(sub) => {
                        self.resolve_path(&normalize(&pkg_dir.join(sub)), own.as_deref(), tried)
                    }
                    None => self.resolve_directory(&pkg_dir, None, tried),
                };

                if found.is_some() {
                    return found;
                }
            }
        }

        None
    }

    fn is_package_root(&self, dir: &Path) -> bool {
        dir.file_name().is_some_and(|name| {
            self.config
                .package_roots
                .iter()
                .any(|root| name == root.as_str())
        })
    }

    /// Look up `candidate` in the file entries of `scope`'s browser map.
    fn remap_file(
        &self,
        scope: Option<&PackageDescriptor>,
        candidate: &Path,
        tried: &mut Vec<PathBuf>,
    ) -> Option<Resolution> {
        let pkg = scope?;
        if !pkg.browser.has_files() {
            return None;
        }

        let target = pkg.browser.file(&self.fs.canonicalize(candidate))?;
        debug!(file = %candidate.display(), package = %pkg.directory.display(), ?target, "Browser field remaps file");
        Some(self.apply_browser_target(pkg, target, TargetOf::File, tried))
    }

    /// Resolve the replacement named by a browser entry. Replacements are
    /// not remapped again.
    ///
    /// Main and file replacements name package files, with or without a
    /// leading `./`; one that matches no file is tried as a module name.
    /// Module replacements follow the usual specifier rules.
    fn apply_browser_target(
        &self,
        pkg: &PackageDescriptor,
        target: &BrowserTarget,
        of: TargetOf,
        tried: &mut Vec<PathBuf>,
    ) -> Resolution {
        let BrowserTarget::Path(spec) = target else {
            return Resolution::Stub;
        };

        let package_relative = of != TargetOf::Module || is_path_specifier(spec);
        let found = if package_relative {
            self.resolve_path(&normalize(&pkg.directory.join(spec)), None, tried)
                .or_else(|| {
                    if is_path_specifier(spec) {
                        None
                    } else {
                        self.resolve_bare(&pkg.directory, spec, None, tried)
                    }
                })
        } else {
            self.resolve_bare(&pkg.directory, spec, None, tried)
        };
        found.unwrap_or(Resolution::Unresolved)
    }
}

/// Which kind of browser entry named a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetOf {
    /// String-valued `browser` field.
    Main,
    /// Entry keyed by a package file.
    File,
    /// Entry keyed by a module name.
    Module,
}

/// Whether a specifier names a filesystem path rather than a package.
#[must_use]
pub fn is_path_specifier(spec: &str) -> bool {
    spec == "."
        || spec == ".."
        || spec.starts_with("./")
        || spec.starts_with("../")
        || is_absolute_path(spec)
}

/// Check if a specifier is an absolute path.
fn is_absolute_path(spec: &str) -> bool {
    // Unix absolute
    if spec.starts_with('/') {
        return true;
    }

    // Windows absolute: C:\, D:\, etc.
    let bytes = spec.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
    {
        return true;
    }

    // UNC path: \\server\share
    spec.starts_with("\\\\")
}

/// Parse a bare specifier into package name and optional subpath.
fn parse_bare_specifier(spec: &str) -> (&str, Option<&str>) {
    // Scoped package: @scope/pkg or @scope/pkg/subpath
    if spec.starts_with('@') {
        let mut slashes = spec.match_indices('/');
        return match (slashes.next(), slashes.next()) {
            (Some(_), Some((i, _))) => (&spec[..i], Some(&spec[i + 1..])),
            _ => (spec, None),
        };
    }

    // Regular package: pkg or pkg/subpath
    match spec.find('/') {
        Some(pos) => (&spec[..pos], Some(&spec[pos + 1..])),
        None => (spec, None),
    }
}

/// Add a path to tried list (with cap).
fn add_tried(tried: &mut Vec<PathBuf>, path: &Path) {
    if tried.len() < MAX_TRIED_PATHS {
        tried.push(path.to_path_buf());
    }
}
