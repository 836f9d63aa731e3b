//! # Key Rotation
//!
//! Round-robin pool of API keys for the recipe-search service.
//!
//! The cursor is an atomic counter inside one process and is mirrored to a
//! small JSON file so the next process starts on the same key. The file is a
//! plain read-modify-write with no lock: two processes advancing at the same
//! time can lose an update, which only means a stale key gets tried again.

use crate::state::io;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Key used when no keys are configured (the service's public test key)
pub const PUBLIC_TEST_KEY: &str = "1";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorFile {
    index: usize,
}

#[derive(Debug)]
pub struct KeyRotation {
    keys: Vec<String>,
    cursor: AtomicUsize,
    cursor_path: Option<PathBuf>,
}

impl KeyRotation {
    /// In-memory rotation starting at the first key
    pub fn new(keys: Vec<String>) -> Self {
        let keys = if keys.is_empty() {
            vec![PUBLIC_TEST_KEY.to_string()]
        } else {
            keys
        };
        Self {
            keys,
            cursor: AtomicUsize::new(0),
            cursor_path: None,
        }
    }

    /// Rotation whose cursor is restored from and saved to `path`.
    /// An unreadable cursor file starts the rotation at the first key.
    pub async fn persisted(keys: Vec<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut rotation = Self::new(keys);
        let index = read_cursor(&path).await.unwrap_or(0) % rotation.keys.len();
        rotation.cursor = AtomicUsize::new(index);
        rotation.cursor_path = Some(path);
        rotation
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn index(&self) -> usize {
        self.cursor.load(Ordering::SeqCst) % self.keys.len()
    }

    pub fn current_key(&self) -> &str {
        &self.keys[self.index()]
    }

    /// Move to the next key, wrapping around. Returns the new index.
    pub async fn advance(&self) -> usize {
        let len = self.keys.len();
        let previous = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % len))
            .unwrap_or_else(|current| current);
        let next = (previous + 1) % len;

        if let Some(path) = &self.cursor_path {
            if let Err(e) = write_cursor(path, next).await {
                tracing::warn!(path = ?path, error = %e, "Failed to persist key cursor");
            }
        }
        tracing::debug!(index = next, pool = len, "Advanced recipe-search key");
        next
    }
}

async fn read_cursor(path: &Path) -> Option<usize> {
    if !io::file_exists(path).await {
        return None;
    }
    let content = io::read_file(path).await.ok()?;
    match serde_json::from_str::<CursorFile>(&content) {
        Ok(cursor) => Some(cursor.index),
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Ignoring corrupt key cursor");
            None
        }
    }
}

async fn write_cursor(path: &Path, index: usize) -> anyhow::Result<()> {
    let content = serde_json::to_string(&CursorFile { index })?;
    io::write_file(path, &content).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_pool_uses_public_key() {
        let rotation = KeyRotation::new(Vec::new());
        assert_eq!(rotation.len(), 1);
        assert_eq!(rotation.current_key(), PUBLIC_TEST_KEY);
    }

    #[tokio::test]
    async fn test_advance_wraps() {
        let rotation = KeyRotation::new(keys(&["a", "b", "c"]));
        assert_eq!(rotation.current_key(), "a");
        assert_eq!(rotation.advance().await, 1);
        assert_eq!(rotation.current_key(), "b");
        rotation.advance().await;
        assert_eq!(rotation.advance().await, 0);
        assert_eq!(rotation.current_key(), "a");
    }

    #[tokio::test]
    async fn test_cursor_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("key_cursor.json");

        let rotation = KeyRotation::persisted(keys(&["a", "b", "c"]), &path).await;
        rotation.advance().await;
        rotation.advance().await;

        let restored = KeyRotation::persisted(keys(&["a", "b", "c"]), &path).await;
        assert_eq!(restored.current_key(), "c");

        // A smaller pool wraps the stored index.
        let shrunk = KeyRotation::persisted(keys(&["a", "b"]), &path).await;
        assert_eq!(shrunk.current_key(), "a");
    }

    #[tokio::test]
    async fn test_corrupt_cursor_starts_at_first_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key_cursor.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let rotation = KeyRotation::persisted(keys(&["a", "b"]), &path).await;
        assert_eq!(rotation.current_key(), "a");
    }
}
