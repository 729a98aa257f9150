//! Hand-off to whatever actually draws the poster.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::store::write_atomic;
use crate::catalog::{CatalogItem, Category};

pub const PLACEHOLDER_MESSAGE: &str = "No movies available.";

/// What the screen should show right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Screen {
    Poster(Slide),
    Placeholder { message: String },
}

impl Screen {
    pub fn placeholder() -> Self {
        Self::Placeholder {
            message: PLACEHOLDER_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slide {
    pub id: u64,
    pub title: String,
    pub caption: String,
    pub category: Category,
    pub release_date: Option<NaiveDate>,
    pub streaming_provider: Option<String>,
    pub artwork_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// `#rrggbb`, absent while unknown.
    pub color: Option<String>,
}

impl Slide {
    pub fn new(item: &CatalogItem, artwork_path: PathBuf, width: u32, height: u32) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            caption: item.caption().to_string(),
            category: item.category,
            release_date: item.release_date,
            streaming_provider: item.streaming_provider.clone(),
            artwork_path,
            width,
            height,
            color: item.dominant_color.map(|c| c.to_hex()),
        }
    }
}

#[async_trait]
pub trait Presenter: Send + Sync {
    async fn present(&self, screen: &Screen);
}

/// Logs every screen change.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

#[async_trait]
impl Presenter for LogPresenter {
    async fn present(&self, screen: &Screen) {
        match screen {
            Screen::Poster(slide) => info!(
                id = slide.id,
                title = %slide.title,
                caption = %slide.caption,
                path = %slide.artwork_path.display(),
                "now showing"
            ),
            Screen::Placeholder { message } => info!(%message, "placeholder shown"),
        }
    }
}

/// Writes the current screen as JSON for an external kiosk UI.
#[derive(Debug, Clone)]
pub struct NowShowingFilePresenter {
    path: PathBuf,
}

impl NowShowingFilePresenter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Presenter for NowShowingFilePresenter {
    async fn present(&self, screen: &Screen) {
        let json = match serde_json::to_vec_pretty(screen) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialise now-showing state");
                return;
            }
        };
        if let Err(err) = write_atomic(&self.path, &json).await {
            warn!(path = %self.path.display(), error = %err, "failed to write now-showing file");
        }
    }
}

/// Forwards each screen to several presenters in order.
pub struct FanOut(pub Vec<Arc<dyn Presenter>>);

#[async_trait]
impl Presenter for FanOut {
    async fn present(&self, screen: &Screen) {
        for presenter in &self.0 {
            presenter.present(screen).await;
        }
    }
}
