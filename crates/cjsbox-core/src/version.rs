use serde::Serialize;
use std::fmt;

/// Crate version, from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the binary was built from, when the build provided one.
pub const GIT_HASH: Option<&str> = option_env!("CJSBOX_BUILD_GIT_HASH");

/// Build identification, as printed by `cjsbox version`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub git_hash: Option<&'static str>,
}

impl VersionInfo {
    #[must_use]
    pub const fn current() -> Self {
        Self {
            name: "cjsbox",
            version: VERSION,
            git_hash: GIT_HASH,
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)?;
        if let Some(hash) = self.git_hash {
            write!(f, " ({hash})")?;
        }
        Ok(())
    }
}

/// `cjsbox <version>` plus the commit hash if known.
#[must_use]
pub fn version_string() -> String {
    VersionInfo::current().to_string()
}
