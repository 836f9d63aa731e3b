//! # IO Utilities
//!
//! File system operations for the `.atlas` data directory. Writes are
//! whole-file overwrites; there is no journaling.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Get the data directory path (.atlas)
///
/// This is the root for stored results, debug artifacts and the settings file.
pub fn get_data_path() -> PathBuf {
    if let Ok(path) = std::env::var("ATLAS_DATA_PATH") {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".atlas")
}

/// Ensure a directory exists
pub async fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create directory: {:?}", path))
}

/// Read a file to a string
pub async fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {:?}", path))
}

/// Write a file, creating parent directories as needed
pub async fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write file: {:?}", path))
}

/// Check if a file exists
pub async fn file_exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

/// Check if a directory exists
pub async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// List file stems with the given extension in a directory, sorted by name
pub async fn list_stems(dir: &Path, extension: &str) -> Result<Vec<String>> {
    if !dir_exists(dir).await {
        return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory: {:?}", dir))?;

    let mut stems = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Ok(file_type) = entry.file_type().await {
            if file_type.is_file() {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
    }

    stems.sort();
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_path() {
        if std::env::var("ATLAS_DATA_PATH").is_err() {
            assert!(get_data_path().ends_with(".atlas"));
        }
    }

    #[tokio::test]
    async fn test_file_operations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hello.json");

        write_file(&path, "{}").await.unwrap();
        assert!(file_exists(&path).await);
        assert_eq!(read_file(&path).await.unwrap(), "{}");

        write_file(&dir.path().join("nested").join("notes.txt"), "x")
            .await
            .unwrap();
        let stems = list_stems(&dir.path().join("nested"), "json").await.unwrap();
        assert_eq!(stems, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let stems = list_stems(&dir.path().join("absent"), "json").await.unwrap();
        assert!(stems.is_empty());
    }
}
