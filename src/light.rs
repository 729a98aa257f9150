//! Best-effort ambient light sync.
//!
//! The rotation loop calls [`LightSync::sync_color`] on every display. The
//! push runs on its own task and its outcome is only logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::LightingConfig;
use crate::error::{Error, Result};
use crate::processing::color::Rgb;

/// Externally reported TV power state; lighting follows it.
///
/// Written by the status webhook, read by the rotation loop.
#[derive(Debug, Clone)]
pub struct LightGate(Arc<AtomicBool>);

impl LightGate {
    pub fn new(open: bool) -> Self {
        Self(Arc::new(AtomicBool::new(open)))
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Store the new state and return the previous one.
    pub fn set(&self, open: bool) -> bool {
        self.0.swap(open, Ordering::AcqRel)
    }
}

#[async_trait]
pub trait LightSink: Send + Sync {
    async fn push(&self, rgb: Rgb) -> Result<()>;
}

/// Govee-style cloud API: `PUT` a color command for one device.
#[derive(Debug, Clone)]
pub struct HttpLightSink {
    http: reqwest::Client,
    url: String,
    api_key: String,
    device: String,
    model: String,
}

impl HttpLightSink {
    /// `None` when credentials or device are missing; light sync stays off.
    pub fn from_config(cfg: &LightingConfig) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = cfg.api_key.clone().filter(|_| cfg.is_usable()) else {
            info!("lighting credentials not configured; light sync disabled");
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .context("failed to build lighting HTTP client")?;
        Ok(Some(Self {
            http,
            url: cfg.api_url.clone(),
            api_key,
            device: cfg.device.clone(),
            model: cfg.model.clone(),
        }))
    }
}

#[async_trait]
impl LightSink for HttpLightSink {
    async fn push(&self, rgb: Rgb) -> Result<()> {
        let Rgb(r, g, b) = rgb;
        let body = json!({
            "device": self.device,
            "model": self.model,
            "cmd": { "name": "color", "value": { "r": r, "g": g, "b": b } },
        });
        let resp = self
            .http
            .put(&self.url)
            .header("Govee-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status,
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}

/// Gated, capped dispatcher of light pushes.
#[derive(Clone)]
pub struct LightSync {
    gate: LightGate,
    sink: Option<Arc<dyn LightSink>>,
    permits: Arc<Semaphore>,
}

impl LightSync {
    pub fn new(gate: LightGate, sink: Option<Arc<dyn LightSink>>, max_in_flight: usize) -> Self {
        Self {
            gate,
            sink,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub fn disabled(gate: LightGate) -> Self {
        Self::new(gate, None, 1)
    }

    /// Dispatch a push without waiting for it.
    ///
    /// Returns the spawned task, or `None` when nothing was sent: no sink,
    /// gate closed, unknown color, or too many pushes already in flight.
    pub fn sync_color(&self, rgb: Rgb) -> Option<JoinHandle<()>> {
        let sink = self.sink.clone()?;
        if !self.gate.is_open() {
            debug!(color = %rgb, "tv is off; skipping light sync");
            return None;
        }
        if rgb == Rgb::BLACK {
            debug!("color unknown; skipping light sync");
            return None;
        }
        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            warn!(color = %rgb, "too many light pushes in flight; dropping");
            return None;
        };
        Some(tokio::spawn(async move {
            let _permit = permit;
            match sink.push(rgb).await {
                Ok(()) => debug!(color = %rgb, "light color pushed"),
                Err(err) => warn!(color = %rgb, error = %err, "light push failed"),
            }
        }))
    }
}
