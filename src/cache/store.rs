use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

const MAX_STEM_LEN: usize = 64;

/// One file per poster key under a single directory.
///
/// File names are derived from the key alone, so the same key always maps to
/// the same file across restarts.
#[derive(Debug, Clone)]
pub struct ArtworkStore {
    root: PathBuf,
}

impl ArtworkStore {
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(file_name_for(key))
    }

    /// Cached bytes, or `None` when nothing is stored for `key`.
    pub async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        write_atomic(&self.path_for(key), bytes).await
    }

    pub async fn remove(&self, key: &str) {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "artwork removed from cache"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "failed to remove cached artwork"),
        }
    }
}

/// Deterministic, filesystem-safe file name for a poster key.
pub fn file_name_for(key: &str) -> String {
    let trimmed = key.trim_start_matches('/');
    let (stem, ext) = match trimmed.rsplit_once('.') {
        Some((stem, ext))
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, ext.to_ascii_lowercase())
        }
        _ => (trimmed, "img".to_string()),
    };
    let safe: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_STEM_LEN)
        .collect();
    format!("{safe}-{:016x}.{ext}", xxh3_64(key.as_bytes()))
}

/// Write via a sibling temp file and rename so readers never see a partial file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    if let Err(err) = fs::write(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err);
    }
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err);
    }
    Ok(())
}
