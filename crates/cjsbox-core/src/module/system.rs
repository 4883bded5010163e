//! The module loader.
//!
//! Load protocol for one canonical path:
//! 1. cache hit: return the record's current exports (possibly partial)
//! 2. insert a fresh record before running anything
//! 3. read, then parse (`.json`) or execute the body
//! 4. on failure evict the record and propagate; on success mark it loaded

use super::cache::{Module, ModuleCache};
use super::executor::{ExecError, Executor, Globals, ModuleScope, Require};
use super::value::Value;
use crate::error::Error;
use crate::resolver::{Resolution, Resolver, ResolverConfig};
use cjsbox_util::FileSystem;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// One isolated module system: a resolver, an executor and a module cache.
///
/// Instances share nothing. Everything is single-threaded; a module body
/// may re-enter the system through its `require` while it runs.
///
/// Exports are shared handles, so a require cycle that stores each side's
/// exports in the other forms an `Rc` cycle. Such graphs are not freed when
/// the system is dropped; they live until the process exits.
pub struct ModuleSystem {
    fs: Rc<dyn FileSystem>,
    resolver: Resolver,
    executor: Box<dyn Executor>,
    modules: RefCell<ModuleCache>,
    globals: Globals,
}

impl ModuleSystem {
    /// Create a module system with the default resolver configuration.
    pub fn new(fs: Rc<dyn FileSystem>, executor: impl Executor + 'static) -> Self {
        Self {
            resolver: Resolver::new(Rc::clone(&fs), ResolverConfig::default()),
            fs,
            executor: Box::new(executor),
            modules: RefCell::new(ModuleCache::new()),
            globals: Globals::new(),
        }
    }

    /// Replace the resolver configuration. Drops any memoized descriptors.
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.resolver = Resolver::new(Rc::clone(&self.fs), config);
        self
    }

    /// Make `name` visible to every module body run after this call.
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    #[must_use]
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Resolve without loading.
    #[must_use]
    pub fn resolve_from(&self, context: &Path, spec: &str, origin: Option<&Path>) -> Resolution {
        self.resolver.resolve_from(context, spec, origin)
    }

    /// Resolve `spec` from `context` and load the result.
    ///
    /// A stub resolution yields a fresh empty object that is not cached.
    pub fn require_from(&self, context: &Path, spec: &str) -> Result<Value, Error> {
        self.require_from_origin(context, spec, None)
    }

    pub(crate) fn require_from_origin(
        &self,
        context: &Path,
        spec: &str,
        origin: Option<&Path>,
    ) -> Result<Value, Error> {
        let result = self.resolver.resolve(context, spec, origin);
        match result.resolution {
            Resolution::Path(path) => self.load(&path),
            Resolution::Stub => Ok(Value::object()),
            Resolution::Unresolved => {
                debug!(
                    specifier = spec,
                    context = %context.display(),
                    reason = ?result.reason,
                    "Module not found"
                );
                Err(Error::ModuleNotFound {
                    specifier: spec.to_string(),
                    context: context.to_path_buf(),
                    tried: result.tried,
                })
            }
        }
    }

    /// Load an already-resolved path. `None` stands for a stub and yields
    /// a fresh empty object.
    pub fn require_module(&self, target: Option<&Path>) -> Result<Value, Error> {
        match target {
            Some(path) => self.load(path),
            None => Ok(Value::object()),
        }
    }

    /// Snapshot of the module cache, keyed by canonical path.
    ///
    /// Includes modules still evaluating (e.g. inside a require cycle).
    #[must_use]
    pub fn loaded_modules(&self) -> BTreeMap<PathBuf, Rc<Module>> {
        self.modules.borrow().snapshot()
    }

    /// The cached record for `path`, if any.
    #[must_use]
    pub fn module(&self, path: &Path) -> Option<Rc<Module>> {
        self.modules.borrow().get(&self.fs.canonicalize(path))
    }

    fn load(&self, path: &Path) -> Result<Value, Error> {
        let key = self.fs.canonicalize(path);

        let cached = self.modules.borrow().get(&key);
        if let Some(module) = cached {
            debug!(path = %key.display(), loaded = module.loaded(), "Module cache hit");
            return Ok(module.exports());
        }

        let module = Rc::new(Module::new(key));
        self.modules.borrow_mut().insert(Rc::clone(&module));
        debug!(path = %module.filename.display(), "Loading module");

        if let Err(e) = self.evaluate(&module) {
            self.modules.borrow_mut().evict(&module);
            debug!(path = %module.filename.display(), error = %e, "Evicted module after failed load");
            return Err(e);
        }

        module.mark_loaded();
        Ok(module.exports())
    }

    fn evaluate(&self, module: &Rc<Module>) -> Result<(), Error> {
        let source = self
            .fs
            .read_to_string(&module.filename)
            .map_err(|source| Error::ModuleRead {
                path: module.filename.clone(),
                source,
            })?;

        if is_json_module(&module.filename) {
            let json: serde_json::Value =
                serde_json::from_str(&source).map_err(|source| Error::JsonModule {
                    path: module.filename.clone(),
                    source,
                })?;
            module.set_exports(json);
            return Ok(());
        }

        let dirname = module.dirname().to_path_buf();
        let mut scope = ModuleScope {
            module: Rc::clone(module),
            exports: module.exports(),
            require: Require::new(self, dirname.clone()),
            filename: &module.filename,
            dirname: &dirname,
            globals: &self.globals,
        };

        self.executor
            .execute(&source, &mut scope)
            .map_err(|e| match e {
                // Nested failures surface unchanged
                ExecError::Require(inner) => *inner,
                other => Error::Evaluation {
                    path: module.filename.clone(),
                    source: other,
                },
            })
    }
}

impl fmt::Debug for ModuleSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSystem")
            .field("resolver", &self.resolver)
            .field("modules", &self.modules.borrow().len())
            .field("globals", &self.globals.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn is_json_module(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cjsbox_util::MemoryFs;
    use std::cell::Cell;

    /// Runs a fixed body for every module; records the filenames seen.
    #[derive(Default)]
    struct Recording {
        seen: Rc<RefCell<Vec<PathBuf>>>,
    }

    impl Executor for Recording {
        fn execute(&self, source: &str, scope: &mut ModuleScope<'_>) -> Result<(), ExecError> {
            self.seen.borrow_mut().push(scope.filename.to_path_buf());
            if let Some(message) = source.strip_prefix("throw ") {
                return Err(ExecError::thrown(message.trim()));
            }
            if let Some(spec) = source.strip_prefix("require ") {
                let dep = scope.require(spec.trim())?;
                scope.exports.as_object().unwrap().set("dep", dep);
                return Ok(());
            }
            scope.exports.as_object().unwrap().set("source", source);
            Ok(())
        }
    }

    fn system(fs: MemoryFs) -> (ModuleSystem, Rc<RefCell<Vec<PathBuf>>>) {
        let executor = Recording::default();
        let seen = Rc::clone(&executor.seen);
        (ModuleSystem::new(Rc::new(fs), executor), seen)
    }

    #[test]
    fn test_require_module_caches_by_path() {
        let (system, seen) = system(MemoryFs::new().with_file("/p/a.js", "a"));

        let first = system.require_module(Some(Path::new("/p/a.js"))).unwrap();
        let second = system.require_module(Some(Path::new("/p/./a.js"))).unwrap();

        assert!(first.same(&second));
        assert_eq!(seen.borrow().len(), 1);
        assert!(system.module(Path::new("/p/a.js")).unwrap().loaded());
    }

    #[test]
    fn test_require_module_none_is_fresh_object() {
        let (system, _) = system(MemoryFs::new());
        let a = system.require_module(None).unwrap();
        let b = system.require_module(None).unwrap();

        assert!(a.as_object().unwrap().is_empty());
        assert!(!a.same(&b));
        assert!(system.loaded_modules().is_empty());
    }

    #[test]
    fn test_json_module_bypasses_executor() {
        let (system, seen) =
            system(MemoryFs::new().with_file("/p/data.json", r#"{"answer": 42}"#));

        let value = system.require_from(Path::new("/p"), "./data.json").unwrap();
        assert_eq!(
            value.as_object().unwrap().get("answer").and_then(|v| v.as_f64()),
            Some(42.0)
        );
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_malformed_json_module_is_not_cached() {
        let (system, _) = system(MemoryFs::new().with_file("/p/data.json", "{ nope"));

        let err = system.require_from(Path::new("/p"), "./data.json").unwrap_err();
        assert!(matches!(err, Error::JsonModule { .. }));
        assert!(system.module(Path::new("/p/data.json")).is_none());
    }

    #[test]
    fn test_thrown_error_wraps_and_evicts() {
        let (system, _) = system(MemoryFs::new().with_file("/p/bad.js", "throw boom"));

        let err = system.require_from(Path::new("/p"), "./bad").unwrap_err();
        match err {
            Error::Evaluation { path, source } => {
                assert_eq!(path, PathBuf::from("/p/bad.js"));
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(system.loaded_modules().is_empty());
    }

    #[test]
    fn test_nested_not_found_propagates_unchanged() {
        let (system, _) = system(MemoryFs::new().with_file("/p/a.js", "require ./missing"));

        let err = system.require_from(Path::new("/p"), "./a").unwrap_err();
        match err {
            Error::ModuleNotFound { specifier, context, .. } => {
                assert_eq!(specifier, "./missing");
                assert_eq!(context, PathBuf::from("/p"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(system.module(Path::new("/p/a.js")).is_none());
    }

    #[test]
    fn test_unresolved_reports_tried_candidates() {
        let mut fs = MemoryFs::new();
        fs.insert_dir("/p");
        let (system, _) = system(fs);

        let err = system.require_from(Path::new("/p"), "./nope").unwrap_err();
        assert!(err.is_not_found());
        let Error::ModuleNotFound { tried, .. } = err else {
            unreachable!()
        };
        assert!(tried.contains(&PathBuf::from("/p/nope.js")));
    }

    #[test]
    fn test_globals_are_visible_to_bodies() {
        struct ReadsGlobal(Rc<Cell<bool>>);
        impl Executor for ReadsGlobal {
            fn execute(&self, _: &str, scope: &mut ModuleScope<'_>) -> Result<(), ExecError> {
                self.0.set(scope.global("process").is_some());
                Ok(())
            }
        }

        let flag = Rc::new(Cell::new(false));
        let system = ModuleSystem::new(
            Rc::new(MemoryFs::new().with_file("/p/a.js", "")),
            ReadsGlobal(Rc::clone(&flag)),
        )
        .with_global("process", Value::object());

        system.require_from(Path::new("/p"), "./a").unwrap();
        assert!(flag.get());
    }

    #[test]
    fn test_with_config_changes_extensions() {
        let (system, _) = system(MemoryFs::new().with_file("/p/a.cjs", "a"));
        let system = system.with_config(ResolverConfig {
            extensions: vec![".cjs".to_string()],
            ..ResolverConfig::default()
        });

        assert!(system.require_from(Path::new("/p"), "./a").is_ok());
    }
}
