use glob::Pattern;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Compiled glob ignore patterns, matched against full paths.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    pub fn new(globs: &[String]) -> Self {
        let patterns = globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches_path(path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// A slice of a root handed to one worker.
///
/// A shallow unit covers only the files directly inside `root`; a deep unit
/// covers the whole subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanUnit {
    pub root: PathBuf,
    pub recursive: bool,
}

impl ScanUnit {
    pub fn shallow(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
        }
    }

    pub fn deep(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
        }
    }

    /// Regular files in this unit, in file-name order. Unreadable entries are
    /// logged and skipped; symlinks are not followed.
    pub fn walk<'a>(&self, ignore: &'a IgnoreSet) -> impl Iterator<Item = PathBuf> + 'a {
        let mut walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }
        walker
            .into_iter()
            .filter_entry(move |entry| !ignore.matches(entry.path()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
    }
}

impl fmt::Display for ScanUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.recursive {
            write!(f, "{} (recursive)", self.root.display())
        } else {
            write!(f, "{}", self.root.display())
        }
    }
}

/// Every regular file under `root`, recursively.
pub fn enumerate_paths<'a>(root: &Path, ignore: &'a IgnoreSet) -> impl Iterator<Item = PathBuf> + 'a {
    ScanUnit::deep(root).walk(ignore)
}

/// Split roots into units: one shallow unit per root plus one deep unit per
/// immediate subdirectory, so a single large root still spreads across workers.
pub fn plan_scan_units(roots: &[String], ignore: &IgnoreSet) -> Vec<ScanUnit> {
    let mut units = Vec::new();

    for root in roots {
        let root_path = Path::new(root);
        if ignore.matches(root_path) {
            debug!("Root {} is ignored", root);
            continue;
        }
        if !root_path.exists() {
            warn!("Root path {} does not exist", root);
            continue;
        }

        units.push(ScanUnit::shallow(root_path));
        if !root_path.is_dir() {
            continue;
        }

        let entries = match fs::read_dir(root_path) {
            Ok(entries) => entries,
            Err(err) => {
                error!("Error reading directory {}: {}", root, err);
                continue;
            }
        };

        let mut subdirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| !ignore.matches(path))
            .collect();
        subdirs.sort();
        units.extend(subdirs.into_iter().map(ScanUnit::deep));
    }

    units
}
