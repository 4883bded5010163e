//! Module resolver for CommonJS specifiers.
//!
//! Turns a specifier plus a requesting directory into exactly one of: a
//! canonical file path, a stub (browser-field exclusion) or unresolved.

mod descriptor;
mod resolve;

pub use descriptor::{BrowserMap, BrowserTarget, DescriptorCache, PackageDescriptor};
pub use resolve::{
    is_path_specifier, Resolution, ResolveReasonCode, ResolveResult, Resolver, ResolverConfig,
    DEFAULT_EXTENSIONS, DEFAULT_MANIFEST, DEFAULT_PACKAGE_ROOTS,
};
