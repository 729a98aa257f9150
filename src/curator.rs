//! Turns raw catalog pages into the rotation list.
//!
//! Per category: fetch, drop records without artwork, apply the category's
//! date or streaming rule, cap, then drop artwork below the minimum width.
//! The survivors are interleaved across categories.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::cache::CacheService;
use crate::catalog::{CatalogItem, CatalogSource, Category};
use crate::config::{CatalogConfig, RotationConfig};

/// Which minimum artwork width applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurationMode {
    /// Process start: stricter, quality over completeness.
    Startup,
    /// In-session refresh.
    Refresh,
}

#[derive(Debug, Clone)]
pub struct CurationPolicy {
    pub per_category_cap: usize,
    pub upcoming_max_pages: u32,
    pub lookup_concurrency: usize,
    pub startup_min_width: u32,
    pub refresh_min_width: u32,
}

impl CurationPolicy {
    pub fn from_config(catalog: &CatalogConfig, rotation: &RotationConfig) -> Self {
        Self {
            per_category_cap: catalog.per_category_cap,
            upcoming_max_pages: catalog.upcoming_max_pages,
            lookup_concurrency: catalog.lookup_concurrency,
            startup_min_width: rotation.startup_min_width,
            refresh_min_width: rotation.refresh_min_width,
        }
    }

    pub fn min_width(&self, mode: CurationMode) -> u32 {
        match mode {
            CurationMode::Startup => self.startup_min_width,
            CurationMode::Refresh => self.refresh_min_width,
        }
    }
}

pub struct Curator {
    source: Arc<dyn CatalogSource>,
    cache: Arc<CacheService>,
    policy: CurationPolicy,
}

impl Curator {
    pub fn new(source: Arc<dyn CatalogSource>, cache: Arc<CacheService>, policy: CurationPolicy) -> Self {
        Self {
            source,
            cache,
            policy,
        }
    }

    pub async fn build_rotation_list<R>(
        &self,
        mode: CurationMode,
        today: NaiveDate,
        rng: &mut R,
    ) -> Vec<CatalogItem>
    where
        R: Rng + Send + ?Sized,
    {
        let min_width = self.policy.min_width(mode);
        let mut curated = Vec::new();
        for category in Category::ALL {
            let items = self.curate_category(category, today).await;
            let eligible = self.keep_wide_enough(items, min_width).await;
            info!(%category, count = eligible.len(), "curated category");
            curated.extend(eligible);
        }
        let list = interleave_by_category(curated, rng);
        info!(?mode, count = list.len(), "rotation list built");
        list
    }

    /// Trailer link for one item, `None` when the source has none.
    pub async fn trailer_for(&self, id: u64) -> Option<String> {
        self.source.fetch_details(id).await.trailer_url
    }

    async fn curate_category(&self, category: Category, today: NaiveDate) -> Vec<CatalogItem> {
        let cap = self.policy.per_category_cap;
        match category {
            Category::Upcoming => self.upcoming(today).await,
            Category::NowShowing => self.first_page(category).await.into_iter().take(cap).collect(),
            Category::StreamingNow | Category::StreamingSoon => {
                let require_provider = category == Category::StreamingNow;
                let source = &self.source;
                stream::iter(self.first_page(category).await)
                    .map(|mut item| async move {
                        item.streaming_provider = source.fetch_details(item.id).await.streaming_provider;
                        item
                    })
                    .buffered(self.policy.lookup_concurrency)
                    .filter(|item| {
                        let keep = !require_provider || item.streaming_provider.is_some();
                        if !keep {
                            debug!(id = item.id, title = %item.title, "not streamable; dropped");
                        }
                        futures::future::ready(keep)
                    })
                    .take(cap)
                    .collect::<Vec<_>>()
                    .await
            }
        }
    }

    async fn first_page(&self, category: Category) -> Vec<CatalogItem> {
        self.source
            .fetch_category(category, 1)
            .await
            .into_iter()
            .filter_map(|record| CatalogItem::from_record(record, category))
            .collect()
    }

    /// Pages until the cap is met, a page is empty, or the page limit is hit.
    async fn upcoming(&self, today: NaiveDate) -> Vec<CatalogItem> {
        let cap = self.policy.per_category_cap;
        let mut items = Vec::new();
        for page in 1..=self.policy.upcoming_max_pages {
            let records = self.source.fetch_category(Category::Upcoming, page).await;
            if records.is_empty() {
                break;
            }
            items.extend(
                records
                    .into_iter()
                    .filter_map(|record| CatalogItem::from_record(record, Category::Upcoming))
                    .filter(|item| item.release_date.is_some_and(|date| date > today)),
            );
            if items.len() >= cap {
                break;
            }
        }
        items.truncate(cap);
        items
    }

    // Fetching the artwork here also warms the cache for first display.
    async fn keep_wide_enough(&self, items: Vec<CatalogItem>, min_width: u32) -> Vec<CatalogItem> {
        let cache = &self.cache;
        stream::iter(items)
            .map(|item| async move {
                let width = cache.get_artwork(&item.poster_key).await.map(|a| a.width());
                (item, width)
            })
            .buffered(self.policy.lookup_concurrency)
            .filter_map(|(item, width)| {
                let keep = match width {
                    Some(w) if w >= min_width => true,
                    Some(w) => {
                        debug!(key = %item.poster_key, width = w, min_width, "artwork too small; dropped");
                        false
                    }
                    None => {
                        debug!(key = %item.poster_key, "artwork unavailable; dropped");
                        false
                    }
                };
                futures::future::ready(keep.then_some(item))
            })
            .collect::<Vec<_>>()
            .await
    }
}

pub fn interleave_by_category<R>(items: Vec<CatalogItem>, rng: &mut R) -> Vec<CatalogItem>
where
    R: Rng + ?Sized,
{
    interleave_by(items, |item| item.category, rng)
}

/// Shuffle each partition, then repeatedly pop from a uniformly random
/// non-empty partition until all are drained.
pub fn interleave_by<T, K, R>(items: Vec<T>, key: impl Fn(&T) -> K, rng: &mut R) -> Vec<T>
where
    K: Ord,
    R: Rng + ?Sized,
{
    let total = items.len();
    let mut grouped: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        grouped.entry(key(&item)).or_default().push(item);
    }
    let mut partitions: Vec<Vec<T>> = grouped.into_values().collect();
    for partition in &mut partitions {
        partition.shuffle(rng);
    }

    let mut out = Vec::with_capacity(total);
    while !partitions.is_empty() {
        let idx = rng.random_range(0..partitions.len());
        if let Some(item) = partitions[idx].pop() {
            out.push(item);
        }
        if partitions[idx].is_empty() {
            partitions.swap_remove(idx);
        }
    }
    out
}
