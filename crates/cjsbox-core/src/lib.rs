#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod module;
pub mod resolver;
pub mod version;

pub use config::Config;
pub use error::Error;
pub use module::{
    Array, ExecError, Executor, Globals, Module, ModuleCache, ModuleScope, ModuleSystem, Object,
    Require, Value,
};
pub use resolver::{
    DescriptorCache, PackageDescriptor, Resolution, ResolveReasonCode, ResolveResult, Resolver,
    ResolverConfig,
};
pub use version::VERSION;
