//! Temporary files for tests that read configuration or data from disk.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Create a fresh temporary directory, removed when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temporary directory")
}

/// Write `contents` to `dir/name`, creating parent directories as needed.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create parent directory");
    }
    std::fs::write(&path, contents).expect("failed to write test file");
    path
}
