#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for cjsbox.
//!
//! This crate provides the filesystem view the resolver and loader consume,
//! with no logging/tracing dependencies. Logging is handled by the CLI and
//! core crates.

pub mod fs;
pub mod memfs;
pub mod path;

pub use fs::{FileKind, FileSystem, OsFs};
pub use memfs::MemoryFs;
