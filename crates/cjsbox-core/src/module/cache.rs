//! Module records and the per-instance module cache.

use super::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One loaded file. The record's identity is fixed; only `exports` changes.
#[derive(Debug)]
pub struct Module {
    /// Canonical absolute path (same as `filename`).
    pub id: PathBuf,
    /// Canonical absolute path of the source file.
    pub filename: PathBuf,
    exports: RefCell<Value>,
    loaded: Cell<bool>,
}

impl Module {
    /// New record with an empty exports object.
    #[must_use]
    pub fn new(filename: PathBuf) -> Self {
        Self {
            id: filename.clone(),
            filename,
            exports: RefCell::new(Value::object()),
            loaded: Cell::new(false),
        }
    }

    /// Current `module.exports`.
    #[must_use]
    pub fn exports(&self) -> Value {
        self.exports.borrow().clone()
    }

    /// Assign `module.exports`, replacing whatever it held.
    pub fn set_exports(&self, value: impl Into<Value>) {
        *self.exports.borrow_mut() = value.into();
    }

    /// Whether the body finished evaluating.
    #[must_use]
    pub fn loaded(&self) -> bool {
        self.loaded.get()
    }

    pub(crate) fn mark_loaded(&self) {
        self.loaded.set(true);
    }

    /// Directory containing the module; nested requires resolve from here.
    #[must_use]
    pub fn dirname(&self) -> &Path {
        self.filename.parent().unwrap_or(&self.filename)
    }
}

/// Module records keyed by canonical path.
///
/// Callers outside the crate only read; insertion and eviction belong to
/// the loader.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: HashMap<PathBuf, Rc<Module>>,
}

impl ModuleCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Rc<Module>> {
        self.modules.get(path).cloned()
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Snapshot of all records, sorted by path.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Rc<Module>> {
        self.modules
            .iter()
            .map(|(path, module)| (path.clone(), Rc::clone(module)))
            .collect()
    }

    pub(crate) fn insert(&mut self, module: Rc<Module>) {
        self.modules.insert(module.id.clone(), module);
    }

    /// Remove `module` if it is still the record cached under its id.
    pub(crate) fn evict(&mut self, module: &Rc<Module>) -> bool {
        match self.modules.get(&module.id) {
            Some(cached) if Rc::ptr_eq(cached, module) => {
                self.modules.remove(&module.id);
                true
            }
            _ => false,
        }
    }
}
