//! Directory walk for `index_directory`: honors an exclude list for build
//! outputs, dot-directories, vendor directories, and files above a size
//! threshold.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Directory names skipped outright, regardless of depth.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "dist",
    "build",
    "out",
    "vendor",
    ".venv",
    "venv",
    "__pycache__",
    ".git",
    ".hg",
    ".svn",
];

#[derive(Debug, Clone)]
pub struct WalkConfig {
    pub excluded_dirs: Vec<String>,
    pub max_file_bytes: u64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            max_file_bytes: 4 * 1024 * 1024,
        }
    }
}

impl WalkConfig {
    fn is_excluded(&self, entry_path: &Path) -> bool {
        entry_path.file_name().and_then(|n| n.to_str()).is_some_and(|name| {
            (name.starts_with('.') && name != "." && name != "..") || self.excluded_dirs.iter().any(|d| d == name)
        })
    }
}

/// Returns every regular file under `root` not excluded by `config`,
/// honoring `recursive = false` as "this directory only".
pub fn walk_files(root: &Path, recursive: bool, config: &WalkConfig) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };

    WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| e.path() == root || !config.is_excluded(e.path()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.metadata().map(|m| m.len() <= config.max_file_bytes).unwrap_or(false))
        .map(|e| e.path().to_path_buf())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walks_nested_files_recursively() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.rs"), "fn b() {}").unwrap();

        let files = walk_files(dir.path(), true, &WalkConfig::default());
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn non_recursive_walk_skips_nested_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.rs"), "fn b() {}").unwrap();

        let files = walk_files(dir.path(), false, &WalkConfig::default());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn excluded_directories_are_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target/out.rs"), "fn x() {}").unwrap();
        fs::write(dir.path().join("keep.rs"), "fn keep() {}").unwrap();

        let files = walk_files(dir.path(), true, &WalkConfig::default());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.rs"));
    }

    #[test]
    fn oversized_files_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.rs"), vec![b'a'; 128]).unwrap();
        let config = WalkConfig {
            max_file_bytes: 64,
            ..WalkConfig::default()
        };
        let files = walk_files(dir.path(), true, &config);
        assert!(files.is_empty());
    }
}
