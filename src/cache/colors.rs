use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::store::write_atomic;
use crate::error::Result;
use crate::processing::color::Rgb;

/// Poster key → dominant color, persisted as one JSON document.
///
/// Loaded once at startup; every insert rewrites the whole file.
#[derive(Debug)]
pub struct ColorStore {
    path: PathBuf,
    map: Mutex<BTreeMap<String, Rgb>>,
}

impl ColorStore {
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, Rgb>>(&bytes) {
                Ok(map) => {
                    info!(path = %path.display(), entries = map.len(), "loaded color cache");
                    map
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "color cache unreadable; starting empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no color cache yet");
                BTreeMap::new()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read color cache; starting empty");
                BTreeMap::new()
            }
        };
        Self {
            path,
            map: Mutex::new(map),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, key: &str) -> Option<Rgb> {
        self.map.lock().await.get(key).copied()
    }

    pub async fn len(&self) -> usize {
        self.map.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.lock().await.is_empty()
    }

    /// Insert and persist. The in-memory entry survives a failed write.
    pub async fn insert(&self, key: &str, rgb: Rgb) -> Result<()> {
        let mut map = self.map.lock().await;
        map.insert(key.to_string(), rgb);
        let json = serde_json::to_vec_pretty(&*map)?;
        // Holding the lock serialises writers on the single file.
        write_atomic(&self.path, &json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colors.json");

        let store = ColorStore::load(&path).await;
        assert!(store.is_empty().await);
        store.insert("/a.jpg", Rgb(1, 2, 3)).await.unwrap();
        store.insert("/b.jpg", Rgb(4, 5, 6)).await.unwrap();

        let reloaded = ColorStore::load(&path).await;
        assert_eq!(reloaded.len().await, 2);
        assert_eq!(reloaded.get("/a.jpg").await, Some(Rgb(1, 2, 3)));
        assert_eq!(reloaded.get("/b.jpg").await, Some(Rgb(4, 5, 6)));
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colors.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = ColorStore::load(&path).await;
        assert!(store.is_empty().await);
        store.insert("/c.jpg", Rgb(9, 9, 9)).await.unwrap();
        let raw: BTreeMap<String, [u8; 3]> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw.get("/c.jpg"), Some(&[9, 9, 9]));
    }
}
