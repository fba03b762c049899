use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lcov_cobertura::cli::{self, ConvertOptions};

/// lcov-cobertura — Convert an LCOV tracefile into a Cobertura XML report.
#[derive(Parser)]
#[command(name = "lcov-cobertura", version, about)]
struct Cli {
    /// LCOV tracefile to convert. Reads stdin when omitted or "-".
    input: Option<PathBuf>,

    /// Where to write the XML report. Writes stdout when omitted or "-".
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory that source paths are relative to.
    #[arg(short, long, default_value = ".", env = "LCOV_COBERTURA_BASE_DIR")]
    base_dir: String,

    /// Comma-separated package names to leave out of the report.
    #[arg(short, long, value_delimiter = ',')]
    excludes: Vec<String>,

    /// Regular expression; packages whose names match from the start are left out.
    #[arg(long = "exclude-pattern")]
    exclude_patterns: Vec<String>,

    /// Print coverage totals to stderr after converting.
    #[arg(long)]
    summary: bool,

    /// Log skipped records and other details to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let text = cli::read_input(args.input.as_deref()).with_context(|| match &args.input {
        Some(path) => format!("Failed to read {}", path.display()),
        None => "Failed to read stdin".to_string(),
    })?;

    let opts = ConvertOptions {
        base_dir: args.base_dir,
        excludes: args.excludes,
        exclude_patterns: args.exclude_patterns,
        timestamp: None,
    };
    let converted = cli::cmd_convert(&text, &opts)?;

    cli::write_output(args.output.as_deref(), &converted.xml).with_context(|| match &args.output {
        Some(path) => format!("Failed to write {}", path.display()),
        None => "Failed to write stdout".to_string(),
    })?;

    if args.summary {
        eprint!("{}", cli::cmd_summary(&converted.model));
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
