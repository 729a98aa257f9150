use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ArtworkSource, CatalogSource, Category, ItemDetails, RawRecord};
use crate::config::CatalogConfig;
use crate::error::{Error, Result};

/// TMDb-style catalog and artwork adapter.
///
/// Every request is bounded by the configured timeout. Failures are logged
/// and contained; callers only ever see empty pages or `None`.
#[derive(Clone)]
pub struct TmdbClient {
    http: Client,
    base_url: String,
    artwork_base_url: String,
    api_key: Option<String>,
    language: String,
    region: String,
}

impl TmdbClient {
    pub fn new(cfg: &CatalogConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(concat!("poster-frame/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build catalog HTTP client")?;
        if cfg.api_key.is_none() {
            warn!("no catalog api key configured; catalog requests will likely be rejected");
        }
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            artwork_base_url: cfg.artwork_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            language: cfg.language.clone(),
            region: cfg.region.clone(),
        })
    }

    fn endpoint(category: Category) -> &'static str {
        match category {
            Category::NowShowing => "movie/now_playing",
            Category::Upcoming => "movie/upcoming",
            Category::StreamingNow => "movie/popular",
            Category::StreamingSoon => "movie/top_rated",
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, extra: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let mut query: Vec<(&str, String)> = vec![("language", self.language.clone())];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.clone()));
        }
        query.extend(extra.iter().cloned());

        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status { status, url });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn trailer_url(&self, id: u64) -> Result<Option<String>> {
        let videos: VideoList = self.get_json(&format!("movie/{id}/videos"), &[]).await?;
        Ok(trailer_from(&videos))
    }

    async fn streaming_provider(&self, id: u64) -> Result<Option<String>> {
        let providers: ProviderResponse = self
            .get_json(&format!("movie/{id}/watch/providers"), &[])
            .await?;
        Ok(provider_for_region(&providers, &self.region))
    }

    fn artwork_url(&self, poster_key: &str) -> String {
        if poster_key.starts_with('/') {
            format!("{}{}", self.artwork_base_url, poster_key)
        } else {
            format!("{}/{}", self.artwork_base_url, poster_key)
        }
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status,
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl CatalogSource for TmdbClient {
    async fn fetch_category(&self, category: Category, page: u32) -> Vec<RawRecord> {
        let path = Self::endpoint(category);
        match self
            .get_json::<Page>(path, &[("page", page.to_string())])
            .await
        {
            Ok(page_body) => {
                let records = records_from(page_body);
                debug!(%category, page, count = records.len(), "catalog page fetched");
                records
            }
            Err(err) => {
                warn!(%category, page, error = %err, "catalog fetch failed; treating as empty");
                Vec::new()
            }
        }
    }

    async fn fetch_details(&self, id: u64) -> ItemDetails {
        let (trailer, provider) = tokio::join!(self.trailer_url(id), self.streaming_provider(id));
        let trailer_url = trailer.unwrap_or_else(|err| {
            warn!(id, error = %err, "trailer lookup failed");
            None
        });
        let streaming_provider = provider.unwrap_or_else(|err| {
            warn!(id, error = %err, "provider lookup failed");
            None
        });
        ItemDetails {
            trailer_url,
            streaming_provider,
        }
    }
}

#[async_trait]
impl ArtworkSource for TmdbClient {
    async fn fetch_artwork(&self, poster_key: &str) -> Option<Bytes> {
        let url = self.artwork_url(poster_key);
        match self.download(&url).await {
            Ok(bytes) => {
                debug!(key = poster_key, bytes = bytes.len(), "artwork downloaded");
                Some(bytes)
            }
            Err(err) => {
                warn!(key = poster_key, error = %err, "artwork download failed");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    results: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoList {
    #[serde(default)]
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    site: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    key: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    results: HashMap<String, RegionProviders>,
}

#[derive(Debug, Default, Deserialize)]
struct RegionProviders {
    #[serde(default)]
    flatrate: Vec<Provider>,
}

#[derive(Debug, Deserialize)]
struct Provider {
    provider_name: String,
}

fn records_from(page: Page) -> Vec<RawRecord> {
    page.results
        .into_iter()
        .map(|entry| RawRecord {
            id: entry.id,
            title: entry.title.unwrap_or_default(),
            poster_key: entry.poster_path.filter(|p| !p.is_empty()),
            release_date: entry.release_date.as_deref().and_then(parse_release_date),
        })
        .collect()
}

fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn trailer_from(videos: &VideoList) -> Option<String> {
    videos
        .results
        .iter()
        .find(|v| v.site == "YouTube" && v.kind == "Trailer" && !v.key.is_empty())
        .map(|v| format!("https://www.youtube.com/embed/{}?autoplay=1", v.key))
}

fn provider_for_region(providers: &ProviderResponse, region: &str) -> Option<String> {
    providers
        .results
        .get(region)
        .and_then(|r| r.flatrate.first())
        .map(|p| p.provider_name.clone())
        .filter(|name| !name.is_empty())
}
