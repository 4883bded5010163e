use crate::module::ExecError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cjsbox operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A specifier resolved to nothing anywhere in the search space.
    #[error("Cannot find module '{specifier}' from '{}'", context.display())]
    ModuleNotFound {
        specifier: String,
        context: PathBuf,
        /// Candidates probed (capped), for diagnostics.
        tried: Vec<PathBuf>,
    },

    #[error("Failed to read module {}: {source}", path.display())]
    ModuleRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON module {}: {source}", path.display())]
    JsonModule {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The module body failed while running in the executor.
    #[error("Error evaluating {}: {source}", path.display())]
    Evaluation {
        path: PathBuf,
        #[source]
        source: ExecError,
    },

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Whether this error means "no such module" rather than a failed load.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. })
    }
}
