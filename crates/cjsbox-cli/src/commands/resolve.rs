//! `cjsbox resolve` command implementation.
//!
//! Resolves one specifier against the host filesystem and reports the
//! outcome, including every candidate probed when nothing matched.

use cjsbox_core::{Config, Resolution, ResolveResult, Resolver};
use cjsbox_util::OsFs;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Exit code when the specifier does not resolve.
const EXIT_UNRESOLVED: i32 = 1;

/// Options for one `resolve` invocation.
#[derive(Debug)]
pub struct ResolveArgs<'a> {
    pub specifier: &'a str,
    /// Directory to resolve from (defaults to cwd).
    pub from: Option<&'a Path>,
    /// Requesting location used for browser-field lookup.
    pub origin: Option<&'a Path>,
    /// Overrides the configured extensions when non-empty.
    pub extensions: &'a [String],
    pub no_browser: bool,
    pub json: bool,
}

/// Result for JSON output.
#[derive(Debug, Serialize)]
struct ResolveOutput {
    specifier: String,
    context: String,
    /// `resolved`, `stub` or `unresolved`.
    status: &'static str,
    path: Option<String>,
    reason: Option<String>,
    tried: Vec<String>,
}

impl ResolveOutput {
    fn new(specifier: &str, context: &Path, result: &ResolveResult) -> Self {
        let (status, path) = match &result.resolution {
            Resolution::Path(path) => ("resolved", Some(path.display().to_string())),
            Resolution::Stub => ("stub", None),
            Resolution::Unresolved => ("unresolved", None),
        };

        Self {
            specifier: specifier.to_string(),
            context: context.display().to_string(),
            status,
            path,
            reason: result.reason.map(|r| r.to_string()),
            tried: result.tried.iter().map(|p| p.display().to_string()).collect(),
        }
    }
}

pub fn run(config: &Config, args: &ResolveArgs<'_>) -> Result<()> {
    let mut resolver_config = config.resolver.clone();
    if !args.extensions.is_empty() {
        resolver_config.extensions = args.extensions.iter().map(|e| dotted(e)).collect();
    }
    if args.no_browser {
        resolver_config.browser = false;
    }

    let context = within(&config.cwd, args.from);
    let origin = args.origin.map(|o| within(&config.cwd, Some(o)));

    let resolver = Resolver::new(Rc::new(OsFs), resolver_config);
    let result = resolver.resolve(&context, args.specifier, origin.as_deref());

    if args.json {
        let out = ResolveOutput::new(args.specifier, &context, &result);
        println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
        if result.resolution.is_unresolved() {
            std::process::exit(EXIT_UNRESOLVED);
        }
        return Ok(());
    }

    match result.resolution {
        Resolution::Path(path) => println!("{}", path.display()),
        Resolution::Stub => println!("stub"),
        Resolution::Unresolved => {
            let reason = result
                .reason
                .map_or_else(|| "UNRESOLVED".to_string(), |r| r.to_string());
            let tried = result
                .tried
                .iter()
                .map(|p| format!("  {}", p.display()))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(miette::miette!(
                code = reason,
                help = format!("tried:\n{tried}"),
                "Cannot find module '{}' from '{}'",
                args.specifier,
                context.display()
            ));
        }
    }

    Ok(())
}

/// `dir` interpreted relative to `cwd`; `cwd` itself when absent.
fn within(cwd: &Path, dir: Option<&Path>) -> PathBuf {
    dir.map_or_else(|| cwd.to_path_buf(), |d| cwd.join(d))
}

/// Accept `--ext cjs` as well as `--ext .cjs`.
fn dotted(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}
