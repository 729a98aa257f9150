mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{FakeArtwork, FakeCatalog, cache_config, date, png, record};
use poster_frame::cache::CacheService;
use poster_frame::catalog::{CatalogItem, Category};
use poster_frame::curator::{CurationMode, CurationPolicy, Curator};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn policy(cap: usize) -> CurationPolicy {
    CurationPolicy {
        per_category_cap: cap,
        upcoming_max_pages: 5,
        lookup_concurrency: 3,
        startup_min_width: 60,
        refresh_min_width: 30,
    }
}

async fn curator(catalog: FakeCatalog, artwork: FakeArtwork, cap: usize) -> (Curator, Arc<FakeCatalog>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(catalog);
    let cache = Arc::new(
        CacheService::open(&cache_config(dir.path()), Arc::new(artwork))
            .await
            .unwrap(),
    );
    (Curator::new(catalog.clone(), cache, policy(cap)), catalog, dir)
}

fn ids(items: &[CatalogItem]) -> HashSet<u64> {
    items.iter().map(|i| i.id).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn applies_category_rules_and_resolution_threshold() {
    let today = date(2025, 7, 1);
    let catalog = FakeCatalog::default()
        .page(
            Category::NowShowing,
            1,
            vec![
                record(1, Some("/wide.png"), None),
                record(2, None, None),
                record(3, Some("/narrow.png"), None),
                record(4, Some("/missing.png"), None),
            ],
        )
        .page(
            Category::Upcoming,
            1,
            vec![
                record(10, Some("/wide.png"), Some(date(2025, 6, 30))),
                record(11, Some("/wide.png"), Some(today)),
                record(12, Some("/wide.png"), Some(date(2025, 7, 2))),
                record(13, Some("/wide.png"), None),
            ],
        )
        .page(
            Category::StreamingNow,
            1,
            vec![
                record(20, Some("/wide.png"), None),
                record(21, Some("/wide.png"), None),
            ],
        )
        .page(
            Category::StreamingSoon,
            1,
            vec![record(30, Some("/wide.png"), None)],
        )
        .provider(20, "Netflix");
    let artwork = FakeArtwork::default()
        .with("/wide.png", png(80, 120, [90, 90, 90]))
        .with("/narrow.png", png(40, 60, [90, 90, 90]));
    let (curator, _catalog, _dir) = curator(catalog, artwork, 20).await;

    let mut rng = StdRng::seed_from_u64(3);
    let startup = curator
        .build_rotation_list(CurationMode::Startup, today, &mut rng)
        .await;
    assert_eq!(ids(&startup), HashSet::from([1, 12, 20, 30]));
    let streaming = startup.iter().find(|i| i.id == 20).unwrap();
    assert_eq!(streaming.streaming_provider.as_deref(), Some("Netflix"));
    assert_eq!(streaming.category, Category::StreamingNow);

    let refresh = curator
        .build_rotation_list(CurationMode::Refresh, today, &mut rng)
        .await;
    assert_eq!(ids(&refresh), HashSet::from([1, 3, 12, 20, 30]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn caps_each_category_in_source_order() {
    let records = (1..=6).map(|id| record(id, Some("/wide.png"), None)).collect();
    let catalog = FakeCatalog::default().page(Category::NowShowing, 1, records);
    let artwork = FakeArtwork::default().with("/wide.png", png(80, 120, [1, 1, 1]));
    let (curator, _catalog, _dir) = curator(catalog, artwork, 3).await;

    let list = curator
        .build_rotation_list(CurationMode::Startup, date(2025, 1, 1), &mut StdRng::seed_from_u64(1))
        .await;
    assert_eq!(ids(&list), HashSet::from([1, 2, 3]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upcoming_pages_stop_at_first_empty_page() {
    let today = date(2025, 1, 1);
    let future = Some(date(2025, 3, 1));
    let catalog = FakeCatalog::default().page(
        Category::Upcoming,
        1,
        vec![record(1, Some("/wide.png"), future), record(2, Some("/wide.png"), future)],
    );
    let artwork = FakeArtwork::default().with("/wide.png", png(80, 120, [1, 1, 1]));
    let (curator, catalog, _dir) = curator(catalog, artwork, 20).await;

    let list = curator
        .build_rotation_list(CurationMode::Startup, today, &mut StdRng::seed_from_u64(1))
        .await;
    assert_eq!(list.len(), 2);
    assert_eq!(catalog.requested_pages(Category::Upcoming), vec![1, 2]);
    assert_eq!(catalog.requested_pages(Category::NowShowing), vec![1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upcoming_pages_are_limited() {
    let today = date(2025, 1, 1);
    let past = Some(date(2024, 1, 1));
    let mut catalog = FakeCatalog::default();
    for page in 1..=7 {
        catalog = catalog.page(
            Category::Upcoming,
            page,
            vec![record(u64::from(page), Some("/wide.png"), past)],
        );
    }
    let artwork = FakeArtwork::default().with("/wide.png", png(80, 120, [1, 1, 1]));
    let (curator, catalog, _dir) = curator(catalog, artwork, 20).await;

    let list = curator
        .build_rotation_list(CurationMode::Startup, today, &mut StdRng::seed_from_u64(1))
        .await;
    assert!(list.is_empty());
    assert_eq!(catalog.requested_pages(Category::Upcoming), vec![1, 2, 3, 4, 5]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_seed_gives_same_order() {
    let catalog = || {
        FakeCatalog::default()
            .page(
                Category::NowShowing,
                1,
                (1..=5).map(|id| record(id, Some("/wide.png"), None)).collect(),
            )
            .page(
                Category::StreamingSoon,
                1,
                (11..=15).map(|id| record(id, Some("/wide.png"), None)).collect(),
            )
    };
    let artwork = || FakeArtwork::default().with("/wide.png", png(80, 120, [1, 1, 1]));
    let (a, _, _da) = curator(catalog(), artwork(), 20).await;
    let (b, _, _db) = curator(catalog(), artwork(), 20).await;

    let today = date(2025, 1, 1);
    let first = a
        .build_rotation_list(CurationMode::Startup, today, &mut StdRng::seed_from_u64(9))
        .await;
    let second = b
        .build_rotation_list(CurationMode::Startup, today, &mut StdRng::seed_from_u64(9))
        .await;
    let order = |items: &[CatalogItem]| items.iter().map(|i| i.id).collect::<Vec<_>>();
    assert_eq!(order(&first), order(&second));
    assert_eq!(first.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn trailer_lookup_goes_through_details() {
    let catalog = FakeCatalog::default().trailer(5, "https://www.youtube.com/embed/xyz?autoplay=1");
    let (curator, _catalog, _dir) = curator(catalog, FakeArtwork::default(), 20).await;
    assert_eq!(
        curator.trailer_for(5).await.as_deref(),
        Some("https://www.youtube.com/embed/xyz?autoplay=1")
    );
    assert!(curator.trailer_for(6).await.is_none());
}
