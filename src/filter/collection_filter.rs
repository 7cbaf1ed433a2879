use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use regex::{Captures, Regex};

use crate::constants::FILTER_COMMENT_PREFIX;
use crate::diagnostics::CollectorError;
use crate::filter::{AccessorEntry, AccessorEntryKind, FileAccessor, FilterOutput, PathFilter};

/// One filter line, split into per-segment patterns
#[derive(Debug)]
struct FilterPath {
    line: String,
    segments: Vec<Regex>,
}

/// Filter parsed from a filter file
#[derive(Debug)]
pub struct CollectionFilter {
    paths: Vec<FilterPath>,
}

impl CollectionFilter {
    /// Load a filter file, expanding `{name}` placeholders from `variables`
    pub fn from_file(path: &Path, variables: &HashMap<String, String>) -> Result<Self> {
        let text = fs::read_to_string(path)
            .context(format!("Failed to read filter file: {}", path.display()))?;
        Self::parse(&text, variables).context(format!("Invalid filter file: {}", path.display()))
    }

    pub fn parse(text: &str, variables: &HashMap<String, String>) -> Result<Self> {
        let placeholder = Regex::new(r"\{([A-Za-z0-9_]+)\}").context("Invalid placeholder regex")?;

        let mut paths = Vec::new();
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(FILTER_COMMENT_PREFIX) {
                continue;
            }

            let expanded = expand_variables(&placeholder, line, variables)
                .context(format!("Line {}: {}", number + 1, line))?;

            let segments = expanded
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| {
                    Regex::new(&format!("(?i)^(?:{})$", segment))
                        .context(format!("Line {}: invalid pattern '{}'", number + 1, segment))
                })
                .collect::<Result<Vec<_>>>()?;

            if segments.is_empty() {
                warn!("Ignoring filter line {} with no path segments", number + 1);
                continue;
            }
            paths.push(FilterPath {
                line: line.to_string(),
                segments,
            });
        }

        debug!("Parsed {} filter path(s)", paths.len());
        Ok(Self { paths })
    }

    /// Number of filter paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn matching_files(
        &self,
        filter_path: &FilterPath,
        accessor: &dyn FileAccessor,
        traversal: &mut Traversal,
    ) -> Vec<AccessorEntry> {
        let mut frontier = vec![accessor.root()];
        let last = filter_path.segments.len() - 1;

        for (depth, segment) in filter_path.segments.iter().enumerate() {
            let wanted = if depth == last {
                AccessorEntryKind::File
            } else {
                AccessorEntryKind::Directory
            };

            let mut next = Vec::new();
            for directory in &frontier {
                let Some(children) = traversal.list(accessor, directory) else {
                    debug!("Filter '{}': skipping unreadable {}", filter_path.line, directory.path);
                    continue;
                };
                next.extend(
                    children
                        .into_iter()
                        .filter(|child| child.kind == wanted && segment.is_match(&child.name)),
                );
            }

            if next.is_empty() {
                break;
            }
            frontier = next;
            if depth == last {
                return frontier;
            }
        }

        Vec::new()
    }
}

/// Problems met while evaluating one filter, each directory reported once
#[derive(Default)]
struct Traversal {
    failed_directories: HashSet<String>,
    reported_entries: HashSet<String>,
    problems: Vec<CollectorError>,
}

impl Traversal {
    fn list(&mut self, accessor: &dyn FileAccessor, directory: &AccessorEntry) -> Option<Vec<AccessorEntry>> {
        if self.failed_directories.contains(&directory.path) {
            return None;
        }
        match accessor.list_directory(directory) {
            Ok(listing) => {
                for problem in listing.problems {
                    self.record_entry_problem(problem);
                }
                Some(listing.entries)
            }
            Err(e) => {
                self.failed_directories.insert(directory.path.clone());
                self.problems.push(e);
                None
            }
        }
    }

    // The same directory is listed once per filter line that reaches it
    fn record_entry_problem(&mut self, problem: CollectorError) {
        let key = problem.to_string();
        if self.reported_entries.insert(key) {
            self.problems.push(problem);
        }
    }
}

fn expand_variables(placeholder: &Regex, line: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut missing = None;
    let expanded = placeholder.replace_all(line, |caps: &Captures| {
        let name = &caps[1];
        match variables.get(name) {
            Some(value) => value.trim_matches('/').to_string(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(anyhow!("Unknown path variable {{{}}}", name)),
        None => Ok(expanded.into_owned()),
    }
}

impl PathFilter for CollectionFilter {
    fn path_descriptors(&self, accessor: &dyn FileAccessor) -> Result<FilterOutput> {
        let mut seen = HashSet::new();
        let mut traversal = Traversal::default();
        let mut descriptors = Vec::new();

        for filter_path in &self.paths {
            for file in self.matching_files(filter_path, accessor, &mut traversal) {
                if !seen.insert(file.path.clone()) {
                    continue;
                }
                match accessor.describe(&file) {
                    Ok(descriptor) => descriptors.push(descriptor),
                    Err(e) => traversal.problems.push(e),
                }
            }
        }

        if descriptors.is_empty() && !self.paths.is_empty() {
            debug!("Filter matched no files");
        }
        Ok(FilterOutput {
            descriptors,
            problems: traversal.problems,
        })
    }
}

/// Reject filters that cannot be evaluated at all
pub fn ensure_not_empty(filter: &CollectionFilter, path: &Path) -> Result<()> {
    if filter.is_empty() {
        bail!("Filter file {} contains no paths", path.display());
    }
    Ok(())
}
