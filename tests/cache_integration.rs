mod common;

use std::sync::Arc;

use common::{FakeArtwork, cache_config, png};
use poster_frame::cache::CacheService;
use poster_frame::processing::color::Rgb;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn artwork_is_fetched_once_and_stored_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = png(40, 60, [10, 200, 30]);
    let source = Arc::new(FakeArtwork::default().with("/a.png", bytes.clone()));
    let cache = CacheService::open(&cache_config(dir.path()), source.clone())
        .await
        .unwrap();

    let art = cache.get_artwork("/a.png").await.expect("artwork");
    assert_eq!((art.width(), art.height()), (40, 60));
    assert_eq!(std::fs::read(&art.path).unwrap(), bytes.to_vec());

    let again = cache.get_artwork("/a.png").await.expect("artwork");
    assert_eq!(again.path, art.path);
    assert_eq!(source.fetches("/a.png"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn corrupt_file_triggers_exactly_one_refetch() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = png(20, 20, [1, 2, 3]);
    let source = Arc::new(FakeArtwork::default().with("/b.png", bytes.clone()));
    let cache = CacheService::open(&cache_config(dir.path()), source.clone())
        .await
        .unwrap();

    let path = cache.artwork_path("/b.png");
    std::fs::write(&path, b"definitely not a png").unwrap();

    let art = cache.get_artwork("/b.png").await.expect("re-fetched artwork");
    assert_eq!(art.width(), 20);
    assert_eq!(source.fetches("/b.png"), 1);
    assert_eq!(std::fs::read(&path).unwrap(), bytes.to_vec());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undecodable_download_is_a_miss_and_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeArtwork::default().with("/c.png", bytes::Bytes::from_static(b"garbage")));
    let cache = CacheService::open(&cache_config(dir.path()), source.clone())
        .await
        .unwrap();

    assert!(cache.get_artwork("/c.png").await.is_none());
    assert_eq!(source.fetches("/c.png"), 1);
    assert!(!cache.artwork_path("/c.png").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dominant_color_is_computed_once() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeArtwork::default().with("/red.png", png(50, 75, [200, 20, 20])));
    let cache = Arc::new(
        CacheService::open(&cache_config(dir.path()), source.clone())
            .await
            .unwrap(),
    );

    let (a, b) = tokio::join!(
        cache.get_dominant_color("/red.png"),
        cache.get_dominant_color("/red.png")
    );
    assert_eq!(a, Rgb(200, 20, 20));
    assert_eq!(a, b);
    assert_eq!(cache.get_dominant_color("/red.png").await, a);
    assert_eq!(cache.color_computations(), 1);
    assert_eq!(source.fetches("/red.png"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn colors_survive_reopen_without_artwork() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = cache_config(dir.path());
    {
        let source = Arc::new(FakeArtwork::default().with("/blue.png", png(30, 30, [10, 10, 220])));
        let cache = CacheService::open(&cfg, source).await.unwrap();
        assert_eq!(cache.get_dominant_color("/blue.png").await, Rgb(10, 10, 220));
    }

    std::fs::remove_dir_all(&cfg.directory).unwrap();
    let empty = Arc::new(FakeArtwork::default());
    let cache = CacheService::open(&cfg, empty.clone()).await.unwrap();
    assert_eq!(cache.get_dominant_color("/blue.png").await, Rgb(10, 10, 220));
    assert_eq!(cache.color_computations(), 0);
    assert_eq!(empty.fetches("/blue.png"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_artwork_yields_black_and_is_not_remembered() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeArtwork::default());
    let cache = CacheService::open(&cache_config(dir.path()), source.clone())
        .await
        .unwrap();

    assert_eq!(cache.get_dominant_color("/late.png").await, Rgb::BLACK);
    assert!(cache.cached_color("/late.png").await.is_none());

    source.insert("/late.png", png(10, 10, [0, 180, 0]));
    assert_eq!(cache.get_dominant_color("/late.png").await, Rgb(0, 180, 0));
    assert_eq!(source.fetches("/late.png"), 2);
}
