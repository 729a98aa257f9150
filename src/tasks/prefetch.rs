use futures::stream::{self, StreamExt};
use tracing::info;

use crate::cache::CacheService;
use crate::catalog::CatalogItem;
use crate::processing::color::Rgb;

/// Warm the artwork and color caches for every item before the first display.
///
/// Order is preserved. Items whose artwork is unavailable keep no color.
pub async fn warm(cache: &CacheService, items: Vec<CatalogItem>, concurrency: usize) -> Vec<CatalogItem> {
    let total = items.len();
    let before = cache.color_computations();
    let warmed: Vec<CatalogItem> = stream::iter(items)
        .map(|mut item| async move {
            let rgb = cache.get_dominant_color(&item.poster_key).await;
            item.dominant_color = (rgb != Rgb::BLACK).then_some(rgb);
            item
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;
    let colored = warmed.iter().filter(|i| i.dominant_color.is_some()).count();
    info!(
        total,
        colored,
        computed = cache.color_computations() - before,
        "startup prefetch complete"
    );
    warmed
}
