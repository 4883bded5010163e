//! The executor boundary.
//!
//! A module body never looks anything up in ambient scope: everything it
//! can reach is passed in through [`ModuleScope`].

use super::cache::Module;
use super::system::ModuleSystem;
use super::value::Value;
use crate::error::Error;
use crate::resolver::Resolution;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Extra bindings made visible to every module body.
pub type Globals = BTreeMap<String, Value>;

/// Failure raised while running a module body.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// A value thrown by the body.
    #[error("{0}")]
    Thrown(String),

    /// A nested `require` failed and the body let it propagate.
    #[error(transparent)]
    Require(Box<Error>),
}

impl ExecError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    pub fn thrown(msg: impl Into<String>) -> Self {
        Self::Thrown(msg.into())
    }
}

impl From<Error> for ExecError {
    fn from(e: Error) -> Self {
        Self::Require(Box::new(e))
    }
}

/// Runs module source text (the sandbox).
pub trait Executor {
    /// Execute `source` with the given bindings. Returning normally means
    /// the body completed; whatever `scope.module` holds as exports at that
    /// point is the module's result.
    fn execute(&self, source: &str, scope: &mut ModuleScope<'_>) -> Result<(), ExecError>;
}

/// The `require` function injected into one module body.
///
/// Bound to the module's own directory, so nested specifiers resolve
/// relative to the requiring file.
#[derive(Clone)]
pub struct Require<'a> {
    system: &'a ModuleSystem,
    dirname: PathBuf,
}

impl<'a> Require<'a> {
    pub(crate) fn new(system: &'a ModuleSystem, dirname: PathBuf) -> Self {
        Self { system, dirname }
    }

    /// `require(specifier)`.
    pub fn require(&self, specifier: &str) -> Result<Value, Error> {
        self.system
            .require_from_origin(&self.dirname, specifier, Some(&self.dirname))
    }

    /// `require.resolve(specifier)`: the resolution, or `ModuleNotFound`.
    pub fn resolve(&self, specifier: &str) -> Result<Resolution, Error> {
        let result = self
            .system
            .resolver()
            .resolve(&self.dirname, specifier, Some(&self.dirname));
        match result.resolution {
            Resolution::Unresolved => Err(Error::ModuleNotFound {
                specifier: specifier.to_string(),
                context: self.dirname.clone(),
                tried: result.tried,
            }),
            resolution => Ok(resolution),
        }
    }

    /// Directory requests are resolved from.
    #[must_use]
    pub fn context(&self) -> &Path {
        &self.dirname
    }
}

impl fmt::Debug for Require<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Require")
            .field("dirname", &self.dirname)
            .finish_non_exhaustive()
    }
}

/// Bindings for one module body: `module`, `exports`, `require`,
/// `__filename`, `__dirname` and the instance's globals.
#[derive(Debug)]
pub struct ModuleScope<'a> {
    /// The module record. `module.set_exports(..)` replaces the result.
    pub module: Rc<Module>,
    /// The `exports` alias. Starts as `module.exports`; rebinding it does
    /// not change the module's result, mutating the object it holds does.
    pub exports: Value,
    pub require: Require<'a>,
    pub filename: &'a Path,
    pub dirname: &'a Path,
    pub globals: &'a Globals,
}

impl ModuleScope<'_> {
    /// Shorthand for `scope.require.require(specifier)`.
    pub fn require(&self, specifier: &str) -> Result<Value, Error> {
        self.require.require(specifier)
    }

    /// Look up an injected global.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }
}
