//! Artwork byte cache and derived-color cache behind one injected service.
//!
//! [`CacheService`] is shared (via `Arc`) by the curator, the rotation loop
//! and the startup prefetch. Artwork lives on disk as one file per poster
//! key; dominant colors live in a single JSON map.

pub mod colors;
pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use bytes::Bytes;
use image::DynamicImage;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::catalog::ArtworkSource;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::processing::color::{Rgb, dominant_color};

pub use colors::ColorStore;
pub use store::ArtworkStore;

/// Decoded artwork plus the cache file backing it.
#[derive(Debug, Clone)]
pub struct Artwork {
    pub key: String,
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl Artwork {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// Artwork could not be obtained; the color lookup degrades to the sentinel.
struct Unavailable;

pub struct CacheService {
    artwork: ArtworkStore,
    colors: ColorStore,
    source: Arc<dyn ArtworkSource>,
    computing: Mutex<HashMap<String, Arc<OnceCell<Rgb>>>>,
    computations: AtomicUsize,
}

impl CacheService {
    #[instrument(skip(source), fields(dir = %cfg.directory.display()))]
    pub async fn open(cfg: &CacheConfig, source: Arc<dyn ArtworkSource>) -> anyhow::Result<Self> {
        let artwork = ArtworkStore::open(&cfg.directory).await.with_context(|| {
            format!(
                "failed to create artwork cache directory {}",
                cfg.directory.display()
            )
        })?;
        let colors = ColorStore::load(&cfg.color_map_path).await;
        Ok(Self::new(artwork, colors, source))
    }

    pub fn new(artwork: ArtworkStore, colors: ColorStore, source: Arc<dyn ArtworkSource>) -> Self {
        Self {
            artwork,
            colors,
            source,
            computing: Mutex::new(HashMap::new()),
            computations: AtomicUsize::new(0),
        }
    }

    pub fn artwork_path(&self, key: &str) -> PathBuf {
        self.artwork.path_for(key)
    }

    /// Number of dominant colors computed (not served from the map) so far.
    pub fn color_computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    /// Cached color without triggering any computation.
    pub async fn cached_color(&self, key: &str) -> Option<Rgb> {
        self.colors.get(key).await
    }

    /// Local file first; an undecodable file is deleted and re-fetched once.
    /// `None` is a definitive miss for this call.
    pub async fn get_artwork(&self, key: &str) -> Option<Artwork> {
        match self.artwork.read(key).await {
            Ok(Some(bytes)) => match decode(Bytes::from(bytes)).await {
                Ok(image) => {
                    debug!(key, "artwork cache hit");
                    return Some(self.wrap(key, image));
                }
                Err(err) => {
                    warn!(key, error = %err, "cached artwork is corrupt; deleting and re-fetching");
                    self.artwork.remove(key).await;
                }
            },
            Ok(None) => debug!(key, "artwork cache miss"),
            Err(err) => {
                warn!(key, error = %err, "cached artwork unreadable; deleting and re-fetching");
                self.artwork.remove(key).await;
            }
        }

        let bytes = self.source.fetch_artwork(key).await?;
        if let Err(err) = self.artwork.write(key, &bytes).await {
            warn!(key, error = %err, "failed to persist artwork; continuing uncached");
        }
        match decode(bytes).await {
            Ok(image) => Some(self.wrap(key, image)),
            Err(err) => {
                warn!(key, error = %err, "downloaded artwork is not a decodable image");
                self.artwork.remove(key).await;
                None
            }
        }
    }

    /// Persisted color if known, otherwise computed once from the artwork.
    /// Returns [`Rgb::BLACK`] when the artwork is unavailable.
    pub async fn get_dominant_color(&self, key: &str) -> Rgb {
        if let Some(rgb) = self.colors.get(key).await {
            return rgb;
        }
        let cell = {
            let mut computing = self.computing.lock().unwrap_or_else(PoisonError::into_inner);
            computing.entry(key.to_string()).or_default().clone()
        };
        let result = cell
            .get_or_try_init(|| self.compute_color(key))
            .await
            .copied();
        self.computing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match result {
            Ok(rgb) => rgb,
            Err(Unavailable) => {
                debug!(key, "artwork unavailable; color unknown");
                Rgb::BLACK
            }
        }
    }

    async fn compute_color(&self, key: &str) -> Result<Rgb, Unavailable> {
        if let Some(rgb) = self.colors.get(key).await {
            return Ok(rgb);
        }
        let artwork = self.get_artwork(key).await.ok_or(Unavailable)?;
        let rgb = tokio::task::spawn_blocking(move || dominant_color(&artwork.image))
            .await
            .map_err(|err| {
                warn!(key, error = %err, "color worker failed");
                Unavailable
            })?;
        self.computations.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.colors.insert(key, rgb).await {
            warn!(key, error = %err, "failed to persist color cache");
        }
        debug!(key, color = %rgb, "dominant color computed");
        Ok(rgb)
    }

    fn wrap(&self, key: &str, image: DynamicImage) -> Artwork {
        Artwork {
            key: key.to_string(),
            path: self.artwork.path_for(key),
            image,
        }
    }
}

async fn decode(bytes: Bytes) -> Result<DynamicImage> {
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
    Ok(image)
}
