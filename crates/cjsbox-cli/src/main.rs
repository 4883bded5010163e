#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use cjsbox_core::Config;
use commands::resolve::ResolveArgs;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "cjsbox")]
#[command(author, version, about = "Inspect CommonJS module resolution", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Resolve a specifier the way `require` would
    Resolve {
        /// The specifier (e.g., "./utils", "lodash/fp", "@scope/pkg")
        specifier: String,

        /// Directory to resolve from (defaults to cwd)
        #[arg(long, value_name = "DIR")]
        from: Option<PathBuf>,

        /// Requesting directory for browser-field lookup (defaults to --from)
        #[arg(long, value_name = "DIR")]
        origin: Option<PathBuf>,

        /// Extension to probe, in order; repeatable (replaces the configured list)
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,

        /// Ignore `browser` fields
        #[arg(long)]
        no_browser: bool,
    },

    /// Show the package descriptor governing a directory
    Describe {
        /// Directory to inspect (defaults to cwd)
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::load(cwd)
        .into_diagnostic()?
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);
    debug!(cwd = %config.cwd.display(), resolver = ?config.resolver, "Loaded config");

    match &cli.command {
        Commands::Version => commands::version::run(cli.json),
        Commands::Resolve {
            specifier,
            from,
            origin,
            extensions,
            no_browser,
        } => commands::resolve::run(
            &config,
            &ResolveArgs {
                specifier,
                from: from.as_deref(),
                origin: origin.as_deref(),
                extensions,
                no_browser: *no_browser,
                json: cli.json,
            },
        ),
        Commands::Describe { dir } => commands::describe::run(&config, dir.as_deref(), cli.json),
    }
}
