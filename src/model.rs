//! In-memory coverage model produced by the LCOV parser and consumed by the
//! Cobertura renderer. Packages, classes and methods keep first-seen order;
//! lines are keyed by number so they come out sorted.

use std::collections::{BTreeMap, HashMap};

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Format a coverage rate the way Cobertura consumers expect it: `"0"` for an
/// empty total, otherwise the shortest decimal that round-trips (`0.5`, `1.0`).
#[must_use]
pub fn format_rate(covered: u64, total: u64) -> String {
    if total == 0 {
        "0".to_string()
    } else {
        // `Debug` keeps the trailing `.0` that `Display` drops.
        format!("{:?}", rate(covered, total))
    }
}

/// Line/branch counters shared by classes, packages and the summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub lines_covered: u64,
    pub lines_total: u64,
    pub branches_covered: u64,
    pub branches_total: u64,
}

impl Counts {
    pub fn add(&mut self, other: &Counts) {
        self.lines_covered += other.lines_covered;
        self.lines_total += other.lines_total;
        self.branches_covered += other.branches_covered;
        self.branches_total += other.branches_total;
    }

    #[must_use]
    pub fn line_rate(&self) -> String {
        format_rate(self.lines_covered, self.lines_total)
    }

    #[must_use]
    pub fn branch_rate(&self) -> String {
        format_rate(self.branches_covered, self.branches_total)
    }
}

/// Coverage of a single source line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCoverage {
    /// Execution count from `DA`. `None` when the line only has branch data.
    pub hits: Option<u64>,
    pub branches_covered: u64,
    pub branches_total: u64,
}

impl LineCoverage {
    /// A line with at least one `BRDA` record.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.branches_total > 0
    }

    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hits.unwrap_or(0)
    }
}

/// A function declared with `FN` and/or counted with `FNDA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    /// Declaration line; absent when only `FNDA` named the function.
    pub line: Option<u32>,
    pub hits: u64,
}

/// One LCOV file section.
#[derive(Debug, Clone, Default)]
pub struct Class {
    /// Source path, relative to the parser's base path.
    pub path: String,
    /// File name component of `path`.
    pub name: String,
    pub lines: BTreeMap<u32, LineCoverage>,
    pub methods: Vec<Method>,
    pub counts: Counts,
    method_index: HashMap<String, usize>,
}

impl Class {
    pub fn new(path: String) -> Self {
        let name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path.as_str())
            .to_string();
        Self {
            path,
            name,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.method_index.get(name).map(|&idx| &self.methods[idx])
    }

    /// Fetch a method by name, registering it on first sight.
    pub fn method_mut(&mut self, name: &str) -> &mut Method {
        let idx = match self.method_index.get(name) {
            Some(&idx) => idx,
            None => {
                self.method_index.insert(name.to_string(), self.methods.len());
                self.methods.push(Method {
                    name: name.to_string(),
                    line: None,
                    hits: 0,
                });
                self.methods.len() - 1
            }
        };
        &mut self.methods[idx]
    }

    /// Fold another section for the same source file into this one. Hit
    /// counts and branch counts add up; declaration lines are taken from
    /// `other` when it has them.
    pub fn merge(&mut self, other: Class) {
        for (number, line) in other.lines {
            let entry = self.lines.entry(number).or_default();
            entry.hits = match (entry.hits, line.hits) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
            };
            entry.branches_covered += line.branches_covered;
            entry.branches_total += line.branches_total;
        }
        for method in other.methods {
            let entry = self.method_mut(&method.name);
            if method.line.is_some() {
                entry.line = method.line;
            }
            entry.hits = entry.hits.saturating_add(method.hits);
        }
    }

    /// Recompute the class counters from its lines.
    pub fn recount(&mut self) {
        let mut counts = Counts::default();
        for line in self.lines.values() {
            if let Some(hits) = line.hits {
                counts.lines_total += 1;
                if hits > 0 {
                    counts.lines_covered += 1;
                }
            }
            counts.branches_covered += line.branches_covered;
            counts.branches_total += line.branches_total;
        }
        self.counts = counts;
    }
}

/// Classes sharing a directory.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub name: String,
    pub classes: Vec<Class>,
    pub counts: Counts,
    class_index: HashMap<String, usize>,
}

impl Package {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn class(&self, path: &str) -> Option<&Class> {
        self.class_index.get(path).map(|&idx| &self.classes[idx])
    }

    /// Fetch a class by path, appending a new one on first sight.
    pub fn class_mut(&mut self, path: &str) -> &mut Class {
        let idx = match self.class_index.get(path) {
            Some(&idx) => idx,
            None => {
                self.class_index.insert(path.to_string(), self.classes.len());
                self.classes.push(Class::new(path.to_string()));
                self.classes.len() - 1
            }
        };
        &mut self.classes[idx]
    }

    #[must_use]
    pub fn line_rate(&self) -> String {
        self.counts.line_rate()
    }

    #[must_use]
    pub fn branch_rate(&self) -> String {
        self.counts.branch_rate()
    }
}

/// The complete result of parsing one LCOV tracefile.
#[derive(Debug, Clone, Default)]
pub struct CoverageModel {
    pub packages: Vec<Package>,
    pub summary: Counts,
    /// Seconds since the Unix epoch at parse time.
    pub timestamp: i64,
    package_index: HashMap<String, usize>,
}

impl CoverageModel {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.package_index.get(name).map(|&idx| &self.packages[idx])
    }

    /// Fetch a package by name, appending a new one on first sight.
    pub fn package_mut(&mut self, name: &str) -> &mut Package {
        let idx = match self.package_index.get(name) {
            Some(&idx) => idx,
            None => {
                self.package_index.insert(name.to_string(), self.packages.len());
                self.packages.push(Package::new(name.to_string()));
                self.packages.len() - 1
            }
        };
        &mut self.packages[idx]
    }

    /// Recompute class, package and summary counters bottom-up.
    pub fn recount(&mut self) {
        let mut summary = Counts::default();
        for package in &mut self.packages {
            let mut counts = Counts::default();
            for class in &mut package.classes {
                class.recount();
                counts.add(&class.counts);
            }
            package.counts = counts;
            summary.add(&counts);
        }
        self.summary = summary;
    }
}
