//! Server configuration

use std::path::PathBuf;

/// Default maximum size of a PDF the server will open (100 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// File extensions the sandbox admits, compared case-insensitively
pub const ALLOWED_EXTENSIONS: &[&str] = &[".pdf"];

/// Roots used when no usable directory was configured. The current working
/// directory is appended at runtime.
pub const DEFAULT_DIRECTORIES: &[&str] = &["~/Downloads", "~/Desktop", "~/Documents"];

/// Configuration for the PDF Annotator MCP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories the server may read PDFs from, as given on the command line
    pub allowed_dirs: Vec<String>,
    /// Maximum file size in bytes (default: 100MB)
    pub max_file_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_dirs: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Expand a leading `~` to `$HOME`. Other paths are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        rest
    } else {
        return PathBuf::from(path);
    };

    match std::env::var_os("HOME") {
        Some(home) if rest.is_empty() => PathBuf::from(home),
        Some(home) => PathBuf::from(home).join(rest),
        None => PathBuf::from(path),
    }
}

/// Whether `path` ends in one of [`ALLOWED_EXTENSIONS`].
pub fn has_allowed_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.allowed_dirs.is_empty());
        assert_eq!(config.max_file_size, 104_857_600);
    }

    #[test]
    fn test_expand_home() {
        let Some(home) = std::env::var_os("HOME") else {
            return;
        };
        let home = PathBuf::from(home);
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/Documents"), home.join("Documents"));
        assert_eq!(expand_home("/tmp/a.pdf"), PathBuf::from("/tmp/a.pdf"));
        assert_eq!(expand_home("~other/a.pdf"), PathBuf::from("~other/a.pdf"));
    }

    #[test]
    fn test_has_allowed_extension() {
        assert!(has_allowed_extension(Path::new("a.pdf")));
        assert!(has_allowed_extension(Path::new("/x/B.PDF")));
        assert!(!has_allowed_extension(Path::new("a.pdf.txt")));
        assert!(!has_allowed_extension(Path::new("pdf")));
    }
}
