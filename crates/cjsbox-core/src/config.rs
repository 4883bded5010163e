use crate::error::Error;
use crate::resolver::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional per-project config file.
pub const CONFIG_FILE_NAME: &str = "cjsbox.json";

/// Runtime configuration for cjsbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Resolver settings (extensions, package roots, browser remapping).
    pub resolver: ResolverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            resolver: ResolverConfig::default(),
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Create a config for `cwd`, reading resolver settings from
    /// `cwd/cjsbox.json` when that file exists.
    pub fn load(cwd: PathBuf) -> Result<Self, Error> {
        let resolver = read_resolver_config(&cwd.join(CONFIG_FILE_NAME))?.unwrap_or_default();
        Ok(Self::new(cwd).with_resolver(resolver))
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set resolver settings.
    #[must_use]
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }
}

/// Read a resolver config file. `Ok(None)` if it does not exist.
fn read_resolver_config(path: &Path) -> Result<Option<ResolverConfig>, Error> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path().to_path_buf()).unwrap();

        assert_eq!(config.cwd, dir.path());
        assert_eq!(config.resolver.extensions, vec![".js", ".json"]);
        assert!(config.resolver.browser);
    }

    #[test]
    fn test_load_reads_partial_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"extensions": [".cjs", ".js"], "browser": false}"#,
        )
        .unwrap();

        let config = Config::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.resolver.extensions, vec![".cjs", ".js"]);
        assert!(!config.resolver.browser);
        // Unspecified fields keep their defaults
        assert_eq!(config.resolver.package_roots, vec!["node_modules"]);
        assert_eq!(config.resolver.manifest, "package.json");
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();

        let err = Config::load(dir.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_builders() {
        let config = Config::new(PathBuf::from("/p"))
            .with_verbosity(2)
            .with_json_logs(true);
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
    }
}
