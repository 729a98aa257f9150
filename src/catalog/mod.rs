//! Catalog records and the seams to the remote catalog and artwork APIs.
//!
//! The rest of the crate talks to [`CatalogSource`] and [`ArtworkSource`]
//! only; [`tmdb::TmdbClient`] is the production implementation. Both traits
//! are infallible by contract: implementations contain their own errors and
//! answer with an empty result or `None`.

pub mod tmdb;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::processing::color::Rgb;

/// Which shelf of the catalog an item was pulled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    NowShowing,
    Upcoming,
    StreamingNow,
    StreamingSoon,
}

impl Category {
    pub const ALL: [Self; 4] = [
        Self::NowShowing,
        Self::Upcoming,
        Self::StreamingNow,
        Self::StreamingSoon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NowShowing => "now-showing",
            Self::Upcoming => "upcoming",
            Self::StreamingNow => "streaming-now",
            Self::StreamingSoon => "streaming-soon",
        }
    }

    /// Caption shown above the artwork.
    pub fn caption(&self) -> &'static str {
        match self {
            Self::NowShowing => "In Theaters Now",
            Self::Upcoming => "Coming to Theaters",
            Self::StreamingNow => "Streaming Now",
            Self::StreamingSoon => "Coming to Streaming",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as returned by the catalog source, before curation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub id: u64,
    pub title: String,
    pub poster_key: Option<String>,
    pub release_date: Option<NaiveDate>,
}

/// Per-item lookups that need a second round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDetails {
    pub trailer_url: Option<String>,
    pub streaming_provider: Option<String>,
}

/// An entry of the rotation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub id: u64,
    pub title: String,
    pub poster_key: String,
    pub category: Category,
    pub release_date: Option<NaiveDate>,
    pub streaming_provider: Option<String>,
    pub dominant_color: Option<Rgb>,
}

impl CatalogItem {
    /// Builds an item from a raw record; records without a usable poster key
    /// are rejected.
    pub fn from_record(record: RawRecord, category: Category) -> Option<Self> {
        let poster_key = record.poster_key.filter(|key| !key.trim().is_empty())?;
        Some(Self {
            id: record.id,
            title: record.title,
            poster_key,
            category,
            release_date: record.release_date,
            streaming_provider: None,
            dominant_color: None,
        })
    }

    pub fn caption(&self) -> &'static str {
        self.category.caption()
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// One page (1-based) of a category. Empty on any failure.
    async fn fetch_category(&self, category: Category, page: u32) -> Vec<RawRecord>;

    /// Trailer and streaming-provider lookups for one item. Fields are `None`
    /// on any failure.
    async fn fetch_details(&self, id: u64) -> ItemDetails;
}

#[async_trait]
pub trait ArtworkSource: Send + Sync {
    /// Raw image bytes for a poster key, `None` on any failure.
    async fn fetch_artwork(&self, poster_key: &str) -> Option<Bytes>;
}
