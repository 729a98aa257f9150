#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use image::{DynamicImage, ImageFormat, Rgb as Pixel, RgbImage};

use poster_frame::catalog::{ArtworkSource, CatalogSource, Category, ItemDetails, RawRecord};
use poster_frame::config::CacheConfig;

pub fn png(width: u32, height: u32, rgb: [u8; 3]) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Pixel(rgb));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    Bytes::from(buf)
}

pub fn cache_config(dir: &Path) -> CacheConfig {
    CacheConfig {
        directory: dir.join("posters"),
        color_map_path: dir.join("colors.json"),
    }
}

pub fn record(id: u64, poster: Option<&str>, release: Option<NaiveDate>) -> RawRecord {
    RawRecord {
        id,
        title: format!("Film {id}"),
        poster_key: poster.map(str::to_string),
        release_date: release,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Serves canned artwork and counts fetches per key.
#[derive(Default)]
pub struct FakeArtwork {
    images: Mutex<HashMap<String, Bytes>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl FakeArtwork {
    pub fn with(mut self, key: &str, bytes: Bytes) -> Self {
        self.images.get_mut().unwrap().insert(key.to_string(), bytes);
        self
    }

    pub fn insert(&self, key: &str, bytes: Bytes) {
        self.images.lock().unwrap().insert(key.to_string(), bytes);
    }

    pub fn fetches(&self, key: &str) -> usize {
        self.fetches.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ArtworkSource for FakeArtwork {
    async fn fetch_artwork(&self, poster_key: &str) -> Option<Bytes> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(poster_key.to_string())
            .or_default() += 1;
        self.images.lock().unwrap().get(poster_key).cloned()
    }
}

/// Canned category pages and per-item details.
#[derive(Default)]
pub struct FakeCatalog {
    pages: HashMap<(Category, u32), Vec<RawRecord>>,
    details: HashMap<u64, ItemDetails>,
    requested: Mutex<Vec<(Category, u32)>>,
}

impl FakeCatalog {
    pub fn page(mut self, category: Category, page: u32, records: Vec<RawRecord>) -> Self {
        self.pages.insert((category, page), records);
        self
    }

    pub fn provider(mut self, id: u64, provider: &str) -> Self {
        self.details.entry(id).or_default().streaming_provider = Some(provider.to_string());
        self
    }

    pub fn trailer(mut self, id: u64, url: &str) -> Self {
        self.details.entry(id).or_default().trailer_url = Some(url.to_string());
        self
    }

    pub fn requested_pages(&self, category: Category) -> Vec<u32> {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, p)| *p)
            .collect()
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_category(&self, category: Category, page: u32) -> Vec<RawRecord> {
        self.requested.lock().unwrap().push((category, page));
        self.pages.get(&(category, page)).cloned().unwrap_or_default()
    }

    async fn fetch_details(&self, id: u64) -> ItemDetails {
        self.details.get(&id).cloned().unwrap_or_default()
    }
}
