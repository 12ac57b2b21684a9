//! Human-readable PDF listings over the sandbox roots

use crate::config::{expand_home, has_allowed_extension};
use crate::source::resolver::{ResolvedFile, Sandbox};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Deepest subdirectory level a listing will descend to
pub const MAX_DEPTH: usize = 5;

/// Largest number of files shown per scanned directory
pub const MAX_LIMIT: usize = 200;

/// A PDF found while walking a directory
#[derive(Debug, Clone)]
pub struct ListedFile {
    pub file: ResolvedFile,
    /// Path relative to the scanned directory
    pub relative: PathBuf,
    pub modified: SystemTime,
}

/// Clamp raw request parameters to the supported ranges.
pub fn clamp_params(depth: i64, limit: i64) -> (usize, usize) {
    let depth = depth.clamp(0, MAX_DEPTH as i64) as usize;
    let limit = limit.clamp(1, MAX_LIMIT as i64) as usize;
    (depth, limit)
}

/// Collect sandbox-valid PDFs under `dir`, descending at most `depth` levels.
///
/// Symlinked directories are never followed. Results are most recent first,
/// then by relative path.
pub fn collect_pdfs(sandbox: &Sandbox, dir: &Path, depth: usize) -> Vec<ListedFile> {
    let mut out = Vec::new();
    walk(sandbox, dir, dir, depth, &mut out);
    out.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.relative.cmp(&b.relative))
    });
    out
}

fn walk(sandbox: &Sandbox, base: &Path, dir: &Path, depth: usize, out: &mut Vec<ListedFile>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to read directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();

        if file_type.is_dir() {
            if depth > 0 {
                walk(sandbox, base, &path, depth - 1, out);
            }
            continue;
        }
        if !has_allowed_extension(&path) {
            continue;
        }
        // Symlinks to files are admitted only if their target passes the sandbox
        let Some(file) = sandbox.check(&path) else {
            continue;
        };
        let modified = std::fs::metadata(&file.path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let relative = path.strip_prefix(base).unwrap_or(&path).to_path_buf();
        out.push(ListedFile {
            file,
            relative,
            modified,
        });
    }
}

/// Pick the directories a filter refers to.
///
/// `"all"` selects every root. A path naming a directory inside a root
/// selects that directory. Anything else is a substring matched against root
/// basenames (case-insensitive) and full root paths.
pub fn select_directories(sandbox: &Sandbox, filter: &str) -> Vec<PathBuf> {
    let filter = filter.trim();
    if filter.is_empty() || filter.eq_ignore_ascii_case("all") {
        return sandbox.roots().to_vec();
    }

    let as_path = expand_home(filter);
    if as_path.is_absolute() || filter.starts_with('~') {
        if let Ok(canonical) = std::fs::canonicalize(&as_path) {
            if canonical.is_dir() && sandbox.is_within_roots(&canonical) {
                return vec![canonical];
            }
        }
    }

    let needle = filter.to_lowercase();
    sandbox
        .roots()
        .iter()
        .filter(|root| {
            let name_matches = root
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase().contains(&needle))
                .unwrap_or(false);
            name_matches || root.to_string_lossy().contains(filter)
        })
        .cloned()
        .collect()
}

fn display_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn format_modified(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Render the listing returned by the `list_pdf_files` tool.
pub fn list_pdf_files(sandbox: &Sandbox, filter: &str, depth: i64, limit: i64) -> String {
    let (depth, limit) = clamp_params(depth, limit);

    let dirs = select_directories(sandbox, filter);
    if dirs.is_empty() {
        return format!("Error: No accessible directory matched '{}'.", filter);
    }

    let mut sections = Vec::new();
    let mut total = 0;
    for dir in &dirs {
        let files = collect_pdfs(sandbox, dir, depth);
        total += files.len();

        sections.push(format!(
            "[{}] PDF files (showing up to {} most recent of {} total):",
            display_name(dir),
            limit,
            files.len()
        ));
        for listed in files.iter().take(limit) {
            sections.push(format!(
                "- {} ({:.1} MB, modified {})",
                listed.relative.display(),
                listed.file.size as f64 / (1024.0 * 1024.0),
                format_modified(listed.modified)
            ));
        }
        sections.push(String::new());
    }

    tracing::debug!(dirs = dirs.len(), total, depth, limit, "listed pdf files");

    if total == 0 {
        return "No PDF files found in the accessible directories.".to_string();
    }

    let mut lines = vec![
        format!(
            "Directories scanned: {} of {} configured",
            dirs.len(),
            sandbox.roots().len()
        ),
        format!("Approx. total PDFs: {}", total),
        "=".repeat(40),
    ];
    lines.extend(sections);
    lines.join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"%PDF-1.4").unwrap();
    }

    /// root/top.pdf, root/l1/a.pdf, ... down to six levels
    fn nested_tree() -> TempDir {
        let root = TempDir::new().unwrap();
        touch(root.path(), "top.pdf");
        let mut rel = PathBuf::new();
        for level in 1..=7 {
            rel.push(format!("l{}", level));
            touch(root.path(), &rel.join(format!("level{}.pdf", level)).to_string_lossy());
        }
        root
    }

    #[rstest]
    #[case(-3, 0, 0, 1)]
    #[case(2, 50, 2, 50)]
    #[case(99, 1000, 5, 200)]
    fn test_clamp_params(
        #[case] depth: i64,
        #[case] limit: i64,
        #[case] want_depth: usize,
        #[case] want_limit: usize,
    ) {
        assert_eq!(clamp_params(depth, limit), (want_depth, want_limit));
    }

    #[test]
    fn test_depth_zero_does_not_descend() {
        let root = nested_tree();
        let sb = Sandbox::new([root.path().to_path_buf()], 1024).unwrap();

        let files = collect_pdfs(&sb, &sb.roots()[0], 0);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("top.pdf"));

        let text = list_pdf_files(&sb, "all", 0, 200);
        assert!(text.contains("- top.pdf"));
        assert!(!text.contains("level1.pdf"));
    }

    #[test]
    fn test_depth_above_clamp_matches_clamp() {
        let root = nested_tree();
        let sb = Sandbox::new([root.path().to_path_buf()], 1024).unwrap();

        let at_clamp = collect_pdfs(&sb, &sb.roots()[0], MAX_DEPTH);
        // top.pdf plus levels 1 through 5
        assert_eq!(at_clamp.len(), 6);

        let strip = |s: String| {
            s.lines()
                .filter(|l| l.starts_with("- "))
                .map(|l| l.split(" (").next().unwrap_or_default().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(
            strip(list_pdf_files(&sb, "all", 5, 50)),
            strip(list_pdf_files(&sb, "all", 50, 50))
        );
    }

    #[test]
    fn test_listing_format() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "a.pdf");
        touch(root.path(), "ignored.txt");
        let sb = Sandbox::new([root.path().to_path_buf()], 1024).unwrap();

        let text = list_pdf_files(&sb, "all", 0, 50);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Directories scanned: 1 of 1 configured");
        assert_eq!(lines[1], "Approx. total PDFs: 1");
        assert_eq!(lines[2], "=".repeat(40));
        assert_eq!(
            lines[3],
            format!(
                "[{}] PDF files (showing up to 50 most recent of 1 total):",
                display_name(&sb.roots()[0])
            )
        );
        assert!(lines[4].starts_with("- a.pdf (0.0 MB, modified "));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_limit_caps_lines_but_not_total() {
        let root = TempDir::new().unwrap();
        for i in 0..4 {
            touch(root.path(), &format!("doc{}.pdf", i));
        }
        let sb = Sandbox::new([root.path().to_path_buf()], 1024).unwrap();

        let text = list_pdf_files(&sb, "all", 0, 2);
        assert!(text.contains("showing up to 2 most recent of 4 total"));
        assert_eq!(text.lines().filter(|l| l.starts_with("- ")).count(), 2);
    }

    #[test]
    fn test_filter_selects_roots() {
        let parent = TempDir::new().unwrap();
        let papers = parent.path().join("Papers");
        let books = parent.path().join("books");
        touch(&papers, "p.pdf");
        touch(&books, "b.pdf");
        let sb = Sandbox::new([papers.clone(), books.clone()], 1024).unwrap();

        let text = list_pdf_files(&sb, "paper", 0, 50);
        assert!(text.starts_with("Directories scanned: 1 of 2 configured"));
        assert!(text.contains("[Papers]"));
        assert!(!text.contains("b.pdf"));

        assert_eq!(
            list_pdf_files(&sb, "nomatch", 0, 50),
            "Error: No accessible directory matched 'nomatch'."
        );
    }

    #[test]
    fn test_filter_accepts_subdirectory_path() {
        let root = TempDir::new().unwrap();
        touch(root.path(), "top.pdf");
        touch(root.path(), "sub/inner.pdf");
        let sb = Sandbox::new([root.path().to_path_buf()], 1024).unwrap();

        let sub = sb.roots()[0].join("sub");
        let text = list_pdf_files(&sb, &sub.to_string_lossy(), 0, 50);
        assert!(text.contains("[sub]"));
        assert!(text.contains("- inner.pdf"));
        assert!(!text.contains("top.pdf"));
    }

    #[test]
    fn test_empty_listing_message() {
        let root = TempDir::new().unwrap();
        let sb = Sandbox::new([root.path().to_path_buf()], 1024).unwrap();
        assert_eq!(
            list_pdf_files(&sb, "all", 0, 50),
            "No PDF files found in the accessible directories."
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_not_followed() {
        let root = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        touch(elsewhere.path(), "hidden.pdf");
        touch(root.path(), "real/visible.pdf");
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("alias")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), root.path().join("escape")).unwrap();
        let sb = Sandbox::new([root.path().to_path_buf()], 1024).unwrap();

        let files = collect_pdfs(&sb, &sb.roots()[0], 3);
        let names: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("real/visible.pdf")]);
    }
}
