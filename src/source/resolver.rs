//! Path sandbox for PDF access
//!
//! Every file the server opens goes through [`Sandbox`]. A rejected path is
//! always reported as plain absence; the reason is only logged.

use crate::config::{expand_home, has_allowed_extension, ServerConfig, DEFAULT_DIRECTORIES};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// A PDF that passed every sandbox check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Canonical path (symlinks resolved)
    pub path: PathBuf,
    /// Size in bytes at the time of the check
    pub size: u64,
}

impl ResolvedFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Allow-list of root directories plus the size limit.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone)]
pub struct Sandbox {
    roots: Vec<PathBuf>,
    max_file_size: u64,
}

/// True when the raw input names a `..` component, with either separator.
fn has_parent_segment(candidate: &str) -> bool {
    candidate.split(['/', '\\']).any(|segment| segment == "..")
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn push_unique(roots: &mut Vec<PathBuf>, root: PathBuf) {
    if !roots.contains(&root) {
        roots.push(root);
    }
}

/// Turn one configured directory into a canonical root, creating it if needed.
fn prepare_root(dir: &str) -> Option<PathBuf> {
    let path = absolutize(expand_home(dir));

    if !path.exists() {
        tracing::info!(path = %path.display(), "creating directory");
        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!(dir, error = %e, "failed to create directory, skipped");
            return None;
        }
    }

    let canonical = match std::fs::canonicalize(&path) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(dir, error = %e, "failed to resolve directory, skipped");
            return None;
        }
    };
    if !canonical.is_dir() {
        tracing::warn!(dir, path = %canonical.display(), "not a directory, skipped");
        return None;
    }
    if std::fs::read_dir(&canonical).is_err() {
        tracing::warn!(dir, path = %canonical.display(), "unreadable directory, skipped");
        return None;
    }
    Some(canonical)
}

fn default_roots() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = DEFAULT_DIRECTORIES.iter().map(|d| expand_home(d)).collect();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }

    let mut roots = Vec::new();
    for candidate in candidates {
        if let Ok(canonical) = std::fs::canonicalize(&candidate) {
            if canonical.is_dir() {
                push_unique(&mut roots, canonical);
            }
        }
    }
    roots
}

impl Sandbox {
    /// Create a sandbox over existing directories.
    ///
    /// Roots that cannot be canonicalized are dropped; an empty result is an error.
    pub fn new(roots: impl IntoIterator<Item = PathBuf>, max_file_size: u64) -> Result<Self> {
        let mut canonical = Vec::new();
        for root in roots {
            match std::fs::canonicalize(&root) {
                Ok(p) if p.is_dir() => push_unique(&mut canonical, p),
                _ => tracing::warn!(path = %root.display(), "ignoring unusable root"),
            }
        }
        if canonical.is_empty() {
            return Err(Error::NoAllowedRoots);
        }
        Ok(Self {
            roots: canonical,
            max_file_size,
        })
    }

    /// Build the sandbox from startup configuration, falling back to the
    /// default directories when none of the configured ones is usable.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let mut roots = Vec::new();
        for dir in &config.allowed_dirs {
            if let Some(root) = prepare_root(dir) {
                push_unique(&mut roots, root);
            }
        }

        if roots.is_empty() {
            if config.allowed_dirs.is_empty() {
                tracing::info!("no directories configured, using defaults");
            } else {
                tracing::warn!("no valid directories from arguments, falling back to defaults");
            }
            roots = default_roots();
        }

        if roots.is_empty() {
            return Err(Error::NoAllowedRoots);
        }
        Ok(Self {
            roots,
            max_file_size: config.max_file_size,
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Whether a canonical path equals, or lies below, one of the roots.
    ///
    /// Comparison is by path component, so `/allowed-evil` is not under `/allowed`.
    pub fn is_within_roots(&self, canonical: &Path) -> bool {
        self.roots.iter().any(|root| canonical.starts_with(root))
    }

    /// Resolve a user-supplied path (absolute, relative or `~`-prefixed).
    pub fn resolve(&self, candidate: &str) -> Option<ResolvedFile> {
        if has_parent_segment(candidate) {
            tracing::warn!(candidate, "path traversal rejected");
            return None;
        }
        self.check(&absolutize(expand_home(candidate)))
    }

    /// Run the sandbox checks on a path that has already passed the syntactic check.
    pub fn check(&self, path: &Path) -> Option<ResolvedFile> {
        let canonical = std::fs::canonicalize(path).ok()?;

        if !self.is_within_roots(&canonical) {
            tracing::warn!(path = %path.display(), "outside accessible directories");
            return None;
        }

        let metadata = std::fs::metadata(&canonical).ok()?;
        if !metadata.is_file() {
            return None;
        }
        if !has_allowed_extension(&canonical) {
            tracing::warn!(path = %path.display(), "disallowed file extension");
            return None;
        }
        if metadata.len() > self.max_file_size {
            tracing::warn!(
                path = %path.display(),
                size = metadata.len(),
                max = self.max_file_size,
                "file too large"
            );
            return None;
        }

        Some(ResolvedFile {
            path: canonical,
            size: metadata.len(),
        })
    }

    /// Locate a PDF by path, exact file name, or case-insensitive name fragment.
    ///
    /// Absolute and `~` paths are resolved directly. Otherwise an exact join
    /// is tried against every root before any fuzzy match; fuzzy candidates
    /// are visited root by root, alphabetically within a root.
    pub fn find(&self, query: &str) -> Option<ResolvedFile> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        if Path::new(query).is_absolute() || query.starts_with('~') {
            return self.resolve(query);
        }
        if has_parent_segment(query) {
            tracing::warn!(query, "path traversal rejected");
            return None;
        }

        if let Some(found) = self.roots.iter().find_map(|root| self.check(&root.join(query))) {
            return Some(found);
        }

        let needle = query.to_lowercase();
        let options = glob::MatchOptions {
            case_sensitive: false,
            ..glob::MatchOptions::new()
        };
        for root in &self.roots {
            let Some(root_str) = root.to_str() else {
                continue;
            };
            let pattern = format!("{}/*.pdf", glob::Pattern::escape(root_str));
            let entries = match glob::glob_with(&pattern, options) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "invalid search pattern");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let matches = entry
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase().contains(&needle))
                    .unwrap_or(false);
                if matches {
                    if let Some(found) = self.check(&entry) {
                        return Some(found);
                    }
                }
            }
        }

        tracing::warn!(query, "file not found");
        None
    }

    /// [`Sandbox::find`], turning absence into [`Error::NotFound`].
    pub fn locate(&self, query: &str) -> Result<ResolvedFile> {
        self.find(query).ok_or_else(|| Error::NotFound {
            query: query.to_string(),
        })
    }
}
