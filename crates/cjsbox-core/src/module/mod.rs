//! Synchronous CommonJS module loading.
//!
//! [`ModuleSystem`] owns the module cache and drives loads; the
//! [`Executor`] it is given runs module bodies.

mod cache;
mod executor;
mod system;
mod value;

pub use cache::{Module, ModuleCache};
pub use executor::{ExecError, Executor, Globals, ModuleScope, Require};
pub use system::ModuleSystem;
pub use value::{Array, Object, Value};
