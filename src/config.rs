use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CATALOG_KEY_ENV: &str = "TMDB_API_KEY";
pub const LIGHT_KEY_ENV: &str = "POSTER_FRAME_LIGHT_KEY";
pub const WEBHOOK_TOKEN_ENV: &str = "POSTER_FRAME_WEBHOOK_TOKEN";

/// Upper bound on pages pulled for the upcoming shelf.
pub const MAX_UPCOMING_PAGES: u32 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Remote catalog and artwork endpoints.
    pub catalog: CatalogConfig,
    /// On-disk artwork and color caches.
    pub cache: CacheConfig,
    /// Display pacing and artwork eligibility.
    pub rotation: RotationConfig,
    /// Daily refresh and periodic restart timers.
    pub schedule: ScheduleConfig,
    /// Ambient light sink; absent disables light sync.
    pub lighting: Option<LightingConfig>,
    /// Inbound TV status webhook.
    pub webhook: WebhookConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Fill secrets that were left out of the file from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if self.catalog.api_key.is_none() {
            self.catalog.api_key = non_empty_env(CATALOG_KEY_ENV);
        }
        if let Some(lighting) = self.lighting.as_mut() {
            if lighting.api_key.is_none() {
                lighting.api_key = non_empty_env(LIGHT_KEY_ENV);
            }
        }
        if self.webhook.token.is_none() {
            self.webhook.token = non_empty_env(WEBHOOK_TOKEN_ENV);
        }
        self
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.catalog
            .validate()
            .context("invalid catalog configuration")?;
        self.cache.validate().context("invalid cache configuration")?;
        self.rotation
            .validate()
            .context("invalid rotation configuration")?;
        self.schedule
            .validate()
            .context("invalid schedule configuration")?;
        if let Some(lighting) = &self.lighting {
            lighting
                .validate()
                .context("invalid lighting configuration")?;
        }
        self.webhook
            .validate()
            .context("invalid webhook configuration")?;
        Ok(self)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CatalogConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub artwork_base_url: String,
    pub language: String,
    /// Watch-provider region used to confirm streaming availability.
    pub region: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub upcoming_max_pages: u32,
    pub per_category_cap: usize,
    /// Concurrent detail/artwork lookups while curating.
    pub lookup_concurrency: usize,
}

impl CatalogConfig {
    fn validate(&self) -> Result<()> {
        ensure!(!self.base_url.trim().is_empty(), "base-url must not be empty");
        ensure!(
            !self.artwork_base_url.trim().is_empty(),
            "artwork-base-url must not be empty"
        );
        ensure!(
            !self.request_timeout.is_zero(),
            "request-timeout must be positive"
        );
        ensure!(
            (1..=MAX_UPCOMING_PAGES).contains(&self.upcoming_max_pages),
            "upcoming-max-pages must be between 1 and {MAX_UPCOMING_PAGES}"
        );
        ensure!(
            self.per_category_cap > 0,
            "per-category-cap must be greater than zero"
        );
        ensure!(
            self.lookup_concurrency > 0,
            "lookup-concurrency must be greater than zero"
        );
        Ok(())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.themoviedb.org/3".into(),
            artwork_base_url: "https://image.tmdb.org/t/p/original".into(),
            language: "en-US".into(),
            region: "US".into(),
            request_timeout: Duration::from_secs(10),
            upcoming_max_pages: MAX_UPCOMING_PAGES,
            per_category_cap: 20,
            lookup_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CacheConfig {
    /// Directory holding one file per poster key.
    pub directory: PathBuf,
    /// JSON file mapping poster key to dominant color.
    pub color_map_path: PathBuf,
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.directory.as_os_str().is_empty(),
            "directory must not be empty"
        );
        ensure!(
            self.color_map_path.file_name().is_some(),
            "color-map-path must include a file name"
        );
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("cache/posters"),
            color_map_path: PathBuf::from("cache/colors.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RotationConfig {
    /// Time each poster stays on screen before auto-advance.
    #[serde(with = "humantime_serde")]
    pub dwell: Duration,
    /// Minimum artwork width accepted when curating at process start.
    pub startup_min_width: u32,
    /// Minimum artwork width accepted during live refreshes and display.
    pub refresh_min_width: u32,
    /// Concurrent color computations during startup prefetch.
    pub prefetch_concurrency: usize,
    /// Shell command used to open a trailer; `{url}` is substituted.
    pub trailer_command: Option<String>,
    /// JSON hand-off file describing the poster currently on screen.
    pub now_showing_path: Option<PathBuf>,
}

impl RotationConfig {
    fn validate(&self) -> Result<()> {
        ensure!(!self.dwell.is_zero(), "dwell must be positive");
        ensure!(
            self.startup_min_width >= self.refresh_min_width,
            "startup-min-width must not be lower than refresh-min-width"
        );
        ensure!(
            self.prefetch_concurrency > 0,
            "prefetch-concurrency must be greater than zero"
        );
        if let Some(cmd) = &self.trailer_command {
            ensure!(!cmd.trim().is_empty(), "trailer-command must not be blank");
        }
        Ok(())
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            dwell: Duration::from_secs(15),
            startup_min_width: 1000,
            refresh_min_width: 600,
            prefetch_concurrency: 4,
            trailer_command: None,
            now_showing_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ScheduleConfig {
    /// Wall-clock time of the daily catalog refresh.
    #[serde(deserialize_with = "deserialize_time_of_day")]
    pub daily_refresh_at: NaiveTime,
    /// Zone for `daily-refresh-at`; the host local zone when unset.
    pub timezone: Option<Tz>,
    /// Full-process restart period; `null` disables restarts.
    #[serde(with = "humantime_serde")]
    pub restart_interval: Option<Duration>,
}

impl ScheduleConfig {
    fn validate(&self) -> Result<()> {
        if let Some(interval) = self.restart_interval {
            ensure!(
                interval >= Duration::from_secs(60),
                "restart-interval must be at least one minute"
            );
        }
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_refresh_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default(),
            timezone: None,
            restart_interval: Some(Duration::from_secs(4 * 60 * 60)),
        }
    }
}

fn deserialize_time_of_day<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time_of_day(&raw).ok_or_else(|| {
        de::Error::invalid_value(de::Unexpected::Str(&raw), &"a time of day like \"03:00\"")
    })
}

pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LightingConfig {
    #[serde(default = "LightingConfig::default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub device: String,
    pub model: String,
    #[serde(
        default = "LightingConfig::default_request_timeout",
        with = "humantime_serde"
    )]
    pub request_timeout: Duration,
    /// Cap on concurrent in-flight pushes; extra pushes are dropped.
    #[serde(default = "LightingConfig::default_max_in_flight")]
    pub max_in_flight: usize,
}

impl LightingConfig {
    fn default_api_url() -> String {
        "https://developer-api.govee.com/v1/devices/control".into()
    }

    const fn default_request_timeout() -> Duration {
        Duration::from_secs(5)
    }

    const fn default_max_in_flight() -> usize {
        4
    }

    /// Credentials and target are present; otherwise light sync stays off.
    pub fn is_usable(&self) -> bool {
        self.api_key.is_some() && !self.device.trim().is_empty()
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.api_url.trim().is_empty(), "api-url must not be empty");
        ensure!(
            !self.request_timeout.is_zero(),
            "request-timeout must be positive"
        );
        ensure!(
            self.max_in_flight > 0,
            "max-in-flight must be greater than zero"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TvState {
    On,
    Off,
}

impl TvState {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub bind_address: IpAddr,
    pub port: u16,
    /// Shared secret expected in the `token` query parameter.
    pub token: Option<String>,
    /// Gate state assumed until the first webhook call arrives.
    pub initial_tv_state: TvState,
    /// Bind retries while a previous instance still holds the port.
    pub bind_attempts: u32,
}

impl WebhookConfig {
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.bind_address, self.port)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.bind_attempts > 0,
            "bind-attempts must be greater than zero"
        );
        if let Some(token) = &self.token {
            ensure!(!token.is_empty(), "token must not be empty when set");
        }
        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: 8754,
            token: None,
            initial_tv_state: TvState::On,
            bind_attempts: 10,
        }
    }
}
