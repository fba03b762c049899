//! Command handler functions for the lcov-cobertura CLI.
//!
//! Conversion returns its output as values so it can be tested without
//! touching stdin/stdout; `read_input` and `write_output` do the I/O.

use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::{ConvertError, Result};
use crate::model::CoverageModel;
use crate::parsers::LcovParser;
use crate::report::{render, ReportFormatter, TextFormatter};

/// Options collected from the command line.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub base_dir: String,
    pub excludes: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Fixed report timestamp; the current time when `None`.
    pub timestamp: Option<i64>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            base_dir: ".".to_string(),
            excludes: Vec::new(),
            exclude_patterns: Vec::new(),
            timestamp: None,
        }
    }
}

/// Result of a conversion: the parsed model and its XML rendering.
#[derive(Debug)]
pub struct Converted {
    pub model: CoverageModel,
    pub xml: String,
}

/// Build a parser configured from `opts`. Relative paths, including the
/// base directory, are resolved against the current directory.
pub fn build_parser(opts: &ConvertOptions) -> Result<LcovParser> {
    let mut parser = LcovParser::new()
        .base_path(opts.base_dir.as_str())
        .working_dir(std::env::current_dir()?)
        .excludes(opts.excludes.iter().map(|e| e.trim()).filter(|e| !e.is_empty()));
    for pattern in &opts.exclude_patterns {
        parser = parser.exclude_pattern(pattern)?;
    }
    if let Some(ts) = opts.timestamp {
        parser = parser.timestamp(ts);
    }
    Ok(parser)
}

/// Parse LCOV text and render it as Cobertura XML.
pub fn cmd_convert(input: &str, opts: &ConvertOptions) -> Result<Converted> {
    let model = build_parser(opts)?.parse(input);
    let xml = render(&model);
    info!(
        packages = model.packages.len(),
        lines_covered = model.summary.lines_covered,
        lines_valid = model.summary.lines_total,
        "converted LCOV to Cobertura"
    );
    Ok(Converted { model, xml })
}

/// Human-readable coverage totals.
pub fn cmd_summary(model: &CoverageModel) -> String {
    TextFormatter.format(model)
}

/// Read the tracefile from `path`, or stdin when `path` is `None` or `-`.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    let bytes = match path {
        Some(p) if p != Path::new("-") => std::fs::read(p)?,
        _ => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    String::from_utf8(bytes).map_err(|e| {
        ConvertError::Parse(format!(
            "Invalid UTF-8 in LCOV data at byte {}",
            e.utf8_error().valid_up_to()
        ))
    })
}

/// Write the report to `path`, or stdout when `path` is `None` or `-`.
pub fn write_output(path: Option<&Path>, xml: &str) -> Result<()> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::write(p, xml)?,
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(xml.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
