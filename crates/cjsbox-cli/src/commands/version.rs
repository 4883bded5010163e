use cjsbox_core::version::VersionInfo;
use miette::{IntoDiagnostic, Result};

pub fn run(json: bool) -> Result<()> {
    let info = VersionInfo::current();
    if json {
        println!("{}", serde_json::to_string_pretty(&info).into_diagnostic()?);
    } else {
        println!("{info}");
    }
    Ok(())
}
