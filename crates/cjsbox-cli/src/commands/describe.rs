//! `cjsbox describe` command implementation.
//!
//! Shows the resolution-relevant fields of the package containing a
//! directory.

use cjsbox_core::resolver::BrowserTarget;
use cjsbox_core::{Config, PackageDescriptor, Resolver};
use cjsbox_util::OsFs;
use miette::{IntoDiagnostic, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

pub fn run(config: &Config, dir: Option<&Path>, json: bool) -> Result<()> {
    let dir = dir.map_or_else(|| config.cwd.clone(), |d| config.cwd.join(d));
    let resolver = Resolver::new(Rc::new(OsFs), config.resolver.clone());
    let descriptor = resolver.nearest_package(&dir);

    if json {
        let out = json!({
            "query": dir.display().to_string(),
            "package": descriptor.as_deref().map(descriptor_json),
        });
        println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
        return Ok(());
    }

    match descriptor {
        Some(pkg) => print_human(&pkg).into_diagnostic(),
        None => {
            println!("no package found for {}", dir.display());
            Ok(())
        }
    }
}

fn target_json(target: &BrowserTarget) -> Value {
    match target {
        BrowserTarget::Path(path) => Value::String(path.clone()),
        BrowserTarget::Stub => Value::Bool(false),
    }
}

fn descriptor_json(pkg: &PackageDescriptor) -> Value {
    let files: BTreeMap<String, Value> = pkg
        .browser
        .files()
        .map(|(path, target)| (path.display().to_string(), target_json(target)))
        .collect();
    let modules: BTreeMap<&str, Value> = pkg
        .browser
        .modules()
        .map(|(name, target)| (name, target_json(target)))
        .collect();

    json!({
        "directory": pkg.directory.display().to_string(),
        "name": pkg.name,
        "main": pkg.main,
        "browser": {
            "main": pkg.browser.main().map(target_json),
            "files": files,
            "modules": modules,
        },
    })
}

fn print_human(pkg: &PackageDescriptor) -> io::Result<()> {
    let mut out = io::stdout().lock();

    writeln!(out, "directory: {}", pkg.directory.display())?;
    writeln!(out, "name:      {}", pkg.name.as_deref().unwrap_or("-"))?;
    writeln!(out, "main:      {}", pkg.main.as_deref().unwrap_or("-"))?;

    if pkg.browser.is_empty() {
        return Ok(());
    }

    writeln!(out, "browser:")?;
    if let Some(target) = pkg.browser.main() {
        writeln!(out, "  (main) -> {}", describe_target(target))?;
    }

    let mut entries: Vec<(String, &BrowserTarget)> = pkg
        .browser
        .files()
        .map(|(path, target)| (path.display().to_string(), target))
        .chain(
            pkg.browser
                .modules()
                .map(|(name, target)| (name.to_string(), target)),
        )
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (key, target) in entries {
        writeln!(out, "  {key} -> {}", describe_target(target))?;
    }
    Ok(())
}

fn describe_target(target: &BrowserTarget) -> &str {
    match target {
        BrowserTarget::Path(path) => path,
        BrowserTarget::Stub => "(stub)",
    }
}
