/// Parser for the LCOV `.info` tracefile format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Key records:
///   TN:<test name>
///   SF:<path to source file>
///   FN:<line>,[<end line>,]<function name>
///   FNDA:<execution count>,<function name>
///   DA:<line number>,<execution count>[,<checksum>]
///   BRDA:<line>,<block>,<branch>,<taken>   ("-" means 0)
///   end_of_record
///
/// Summary records (LF, LH, BRF, BRH, FNF, FNH) are ignored; every count is
/// derived from the detail records. Anything unrecognized is skipped.
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::model::{Class, CoverageModel};

/// Package name used for files that sit directly in the base directory.
pub const ROOT_PACKAGE: &str = ".";

/// Parse LCOV text with the given base path and excluded package names.
pub fn parse(input: &str, base_path: &str, excludes: &HashSet<String>) -> CoverageModel {
    LcovParser::new()
        .base_path(base_path)
        .excludes(excludes.iter().cloned())
        .parse(input)
}

/// Configurable LCOV parser. Parsing itself never fails: malformed directives
/// are skipped and non-numeric counts read as zero.
#[derive(Debug, Clone)]
pub struct LcovParser {
    base_path: String,
    excludes: HashSet<String>,
    exclude_patterns: Vec<Regex>,
    timestamp: Option<i64>,
    working_dir: Option<PathBuf>,
}

impl Default for LcovParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LcovParser {
    pub fn new() -> Self {
        Self {
            base_path: ".".to_string(),
            excludes: HashSet::new(),
            exclude_patterns: Vec::new(),
            timestamp: None,
            working_dir: None,
        }
    }

    /// Directory that source paths are made relative to before package names
    /// are derived.
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Drop the package with exactly this name.
    #[must_use]
    pub fn exclude(mut self, package: impl Into<String>) -> Self {
        self.excludes.insert(package.into());
        self
    }

    #[must_use]
    pub fn excludes<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(packages.into_iter().map(Into::into));
        self
    }

    /// Drop every package whose name matches `pattern` from its first
    /// character on.
    pub fn exclude_pattern(mut self, pattern: &str) -> Result<Self> {
        let anchored = Regex::new(&format!("^(?:{pattern})")).map_err(|source| {
            ConvertError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        self.exclude_patterns.push(anchored);
        Ok(self)
    }

    /// Fix the report timestamp (seconds since the epoch) instead of using
    /// the current time.
    #[must_use]
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Directory that relative source paths and a relative base path are
    /// resolved against, so absolute `SF` paths can be matched to a relative
    /// base such as `.`.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn is_excluded(&self, package: &str) -> bool {
        self.excludes.contains(package)
            || self.exclude_patterns.iter().any(|re| re.is_match(package))
    }

    /// Run one pass over `input` and build the aggregated model.
    pub fn parse(&self, input: &str) -> CoverageModel {
        let timestamp = self.timestamp.unwrap_or_else(|| Utc::now().timestamp());
        let mut model = CoverageModel::new(timestamp);
        let mut current: Option<Section> = None;

        for (idx, raw_line) in input.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if line == "end_of_record" {
                if let Some(section) = current.take() {
                    section.flush(&mut model);
                }
                continue;
            }

            // Split on first ':'
            let Some((tag, value)) = line.split_once(':') else {
                debug!(line = idx + 1, "skipping line without a record tag");
                continue;
            };

            if tag == "SF" {
                if let Some(section) = current.take() {
                    debug!(path = %section.class.path, "section closed by SF without end_of_record");
                    section.flush(&mut model);
                }
                current = Some(self.open_section(value.trim()));
                continue;
            }

            let Some(section) = current.as_mut() else {
                debug!(line = idx + 1, tag, "skipping record outside of a file section");
                continue;
            };

            let applied = match tag {
                "DA" => section.line_hits(value),
                "BRDA" => section.branch(value),
                "FN" => section.function(value),
                "FNDA" => section.function_hits(value),
                // TN, LF, LH, BRF, BRH, FNF, FNH and unknown tags.
                _ => true,
            };
            if !applied {
                debug!(line = idx + 1, tag, value, "skipping malformed record");
            }
        }

        // End of input closes a dangling section.
        if let Some(section) = current.take() {
            debug!(path = %section.class.path, "input ended without end_of_record");
            section.flush(&mut model);
        }

        model.recount();
        model
    }

    fn open_section(&self, source_file: &str) -> Section {
        let path = relative_path(source_file, &self.base_path, self.working_dir.as_deref());
        let package = package_name(&path);
        let excluded = self.is_excluded(&package);
        Section {
            package,
            excluded,
            class: Class::new(path),
        }
    }
}

/// State for the file section being scanned.
struct Section {
    package: String,
    excluded: bool,
    class: Class,
}

impl Section {
    /// DA:<line_number>,<execution_count>[,<checksum>]
    fn line_hits(&mut self, value: &str) -> bool {
        let mut parts = value.splitn(3, ',');
        let (Some(number), Some(count)) = (parts.next(), parts.next()) else {
            return false;
        };
        let Some(number) = parse_line_number(number) else {
            return false;
        };
        let line = self.class.lines.entry(number).or_default();
        line.hits = Some(line.hit_count().saturating_add(parse_count(count)));
        true
    }

    /// BRDA:<line>,<block>,<branch>,<taken>
    fn branch(&mut self, value: &str) -> bool {
        let parts: Vec<&str> = value.splitn(4, ',').collect();
        if parts.len() != 4 {
            return false;
        }
        let Some(number) = parse_line_number(parts[0]) else {
            return false;
        };
        let line = self.class.lines.entry(number).or_default();
        line.branches_total += 1;
        if parts[3].trim() != "-" && parse_count(parts[3]) > 0 {
            line.branches_covered += 1;
        }
        true
    }

    /// FN:<line>,<name> or FN:<line>,<end line>,<name>
    fn function(&mut self, value: &str) -> bool {
        let Some((number, rest)) = value.split_once(',') else {
            return false;
        };
        let Some(number) = parse_line_number(number) else {
            return false;
        };
        let name = match rest.split_once(',') {
            Some((end, name)) if parse_line_number(end).is_some() => name,
            _ => rest,
        };
        self.class.method_mut(name).line = Some(number);
        true
    }

    /// FNDA:<execution_count>,<name>
    fn function_hits(&mut self, value: &str) -> bool {
        let Some((count, name)) = value.split_once(',') else {
            return false;
        };
        self.class.method_mut(name).hits = parse_count(count);
        true
    }

    fn flush(self, model: &mut CoverageModel) {
        if self.excluded {
            debug!(package = %self.package, path = %self.class.path, "dropping excluded section");
            return;
        }
        let path = self.class.path.clone();
        model
            .package_mut(&self.package)
            .class_mut(&path)
            .merge(self.class);
    }
}

/// Parse an execution count, reading anything that is not a non-negative
/// integer (gcov's `=====` and `#####` markers, negative counts) as 0.
fn parse_count(s: &str) -> u64 {
    s.trim().parse::<u64>().unwrap_or(0)
}

fn parse_line_number(s: &str) -> Option<u32> {
    s.trim().parse::<u32>().ok()
}

/// Express `path` relative to `base`, resolving both against `cwd` when
/// given. Paths outside of `base` are kept as written, minus `.` components.
fn relative_path(path: &str, base: &str, cwd: Option<&Path>) -> String {
    let written = without_cur_dir(Path::new(path));
    let (full, base) = match cwd {
        Some(cwd) => (
            without_cur_dir(&cwd.join(path)),
            without_cur_dir(&cwd.join(base)),
        ),
        None => (written.clone(), without_cur_dir(Path::new(base))),
    };
    if base.as_os_str().is_empty() {
        return written.to_string_lossy().into_owned();
    }
    match full.strip_prefix(&base) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().into_owned(),
        _ => written.to_string_lossy().into_owned(),
    }
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Dotted package name from the directory part of a relative path.
fn package_name(path: &str) -> String {
    let dirs: Vec<String> = Path::new(path)
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    if dirs.is_empty() {
        ROOT_PACKAGE.to_string()
    } else {
        dirs.join(".")
    }
}
