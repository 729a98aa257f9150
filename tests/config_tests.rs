use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use poster_frame::config::{Configuration, TvState, parse_time_of_day};

#[test]
fn empty_document_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.rotation.dwell, Duration::from_secs(15));
    assert_eq!(cfg.catalog.per_category_cap, 20);
    assert_eq!(cfg.catalog.upcoming_max_pages, 5);
    assert_eq!(cfg.schedule.daily_refresh_at, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
    assert_eq!(cfg.schedule.restart_interval, Some(Duration::from_secs(4 * 3600)));
    assert_eq!(cfg.cache.directory, PathBuf::from("cache/posters"));
    assert!(cfg.lighting.is_none());
    assert!(cfg.webhook.enabled);
    assert_eq!(cfg.webhook.initial_tv_state, TvState::On);
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
catalog:
  api-key: abc
  region: GB
  upcoming-max-pages: 2
cache:
  directory: /var/cache/posters
  color-map-path: /var/cache/colors.json
rotation:
  dwell: 20s
  startup-min-width: 1200
  trailer-command: "xdg-open {url}"
schedule:
  daily-refresh-at: "04:30"
  timezone: Europe/London
  restart-interval: 6h
lighting:
  api-key: light
  device: "AA:BB"
  model: H6199
webhook:
  port: 9000
  token: hush
  initial-tv-state: off
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.catalog.api_key.as_deref(), Some("abc"));
    assert_eq!(cfg.catalog.upcoming_max_pages, 2);
    assert_eq!(cfg.rotation.dwell, Duration::from_secs(20));
    assert_eq!(cfg.rotation.startup_min_width, 1200);
    assert_eq!(cfg.schedule.daily_refresh_at, NaiveTime::from_hms_opt(4, 30, 0).unwrap());
    assert_eq!(cfg.schedule.timezone, Some(chrono_tz::Europe::London));
    assert_eq!(cfg.schedule.restart_interval, Some(Duration::from_secs(6 * 3600)));
    let lighting = cfg.lighting.unwrap();
    assert!(lighting.is_usable());
    assert_eq!(lighting.max_in_flight, 4);
    assert_eq!(cfg.webhook.port, 9000);
    assert_eq!(cfg.webhook.initial_tv_state, TvState::Off);
}

#[test]
fn null_restart_interval_disables_restarts() {
    let cfg: Configuration = serde_yaml::from_str("schedule:\n  restart-interval: null\n").unwrap();
    assert_eq!(cfg.schedule.restart_interval, None);
    assert!(cfg.validated().is_ok());
}

#[test]
fn rejects_unknown_top_level_keys() {
    assert!(serde_yaml::from_str::<Configuration>("library-path: /p\n").is_err());
}

#[test]
fn rejects_bad_time_of_day() {
    assert!(serde_yaml::from_str::<Configuration>("schedule:\n  daily-refresh-at: \"25:00\"\n").is_err());
    assert_eq!(parse_time_of_day("03:00:15"), NaiveTime::from_hms_opt(3, 0, 15));
}

#[test]
fn validation_catches_out_of_range_values() {
    let cases = [
        "catalog:\n  upcoming-max-pages: 6\n",
        "catalog:\n  upcoming-max-pages: 0\n",
        "catalog:\n  per-category-cap: 0\n",
        "rotation:\n  dwell: 0s\n",
        "rotation:\n  startup-min-width: 500\n  refresh-min-width: 600\n",
        "schedule:\n  restart-interval: 10s\n",
        "webhook:\n  bind-attempts: 0\n",
        "lighting:\n  device: x\n  model: y\n  max-in-flight: 0\n",
    ];
    for yaml in cases {
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "accepted: {yaml}");
    }
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "rotation:\n  dwell: 5s\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.rotation.dwell, Duration::from_secs(5));
}
