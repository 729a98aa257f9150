pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::select;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheService;
use crate::catalog::CatalogItem;
use crate::config::{RotationConfig, ScheduleConfig};
use crate::curator::{CurationMode, Curator};
use crate::display::{Presenter, Screen, Slide};
use crate::events::RotationCommand;
use crate::light::LightSync;
use crate::platform::opener::TrailerOpener;
use crate::processing::color::Rgb;
use crate::schedule::{TimerQueue, delay_until, next_refresh_after};

use self::state::RotationState;

const IDLE_WAKE: Duration = Duration::from_secs(24 * 60 * 60);

/// Invoked when the restart timer fires. Production relaunches the process.
pub type RestartHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RotationSettings {
    pub dwell: Duration,
    /// Artwork narrower than this is skipped while rotating.
    pub min_width: u32,
    pub daily_refresh_at: NaiveTime,
    pub timezone: Option<Tz>,
    pub restart_interval: Option<Duration>,
}

impl RotationSettings {
    pub fn from_config(rotation: &RotationConfig, schedule: &ScheduleConfig) -> Self {
        Self {
            dwell: rotation.dwell,
            min_width: rotation.refresh_min_width,
            daily_refresh_at: schedule.daily_refresh_at,
            timezone: schedule.timezone,
            restart_interval: schedule.restart_interval,
        }
    }

    fn today(&self) -> NaiveDate {
        today_in(self.timezone)
    }
}

/// Today's date in `zone`, or the host local zone.
pub fn today_in(zone: Option<Tz>) -> NaiveDate {
    let now = Utc::now();
    match zone {
        Some(tz) => now.with_timezone(&tz).date_naive(),
        None => now.with_timezone(&Local).date_naive(),
    }
}

/// Everything the loop needs besides its channels.
pub struct RotationContext {
    pub curator: Arc<Curator>,
    pub cache: Arc<CacheService>,
    pub presenter: Arc<dyn Presenter>,
    pub light: LightSync,
    pub opener: TrailerOpener,
    pub settings: RotationSettings,
    pub restart: RestartHook,
    pub rng: StdRng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Advance,
    DailyRefresh,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Stay,
    Forward,
    Backward,
}

/// Drives rotation, daily refresh, restart and manual commands from one loop.
///
/// Rules:
/// - Exactly one advance timer is armed while a poster is shown; none while idle.
/// - Any navigation cancels the pending advance before arming the next.
/// - Ineligible artwork is skipped in the direction of travel, trying each
///   item at most once before showing the last one regardless.
/// - The daily refresh re-arms itself for the following day as soon as it
///   fires; a refresh that yields nothing keeps the current list.
pub async fn run(
    ctx: RotationContext,
    initial: Vec<CatalogItem>,
    mut commands: Receiver<RotationCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    let (refresh_tx, mut refresh_rx) = mpsc::channel::<Vec<CatalogItem>>(1);
    let mut engine = Engine::new(ctx, initial, refresh_tx);
    engine.arm_daily_refresh(Utc::now());
    engine.arm_restart();
    engine.show(Step::Stay).await;

    let mut commands_open = true;
    loop {
        let deadline = engine.timers.next_deadline();
        select! {
            _ = cancel.cancelled() => break,

            cmd = commands.recv(), if commands_open => match cmd {
                Some(RotationCommand::Quit) => {
                    info!("quit requested");
                    cancel.cancel();
                    break;
                }
                Some(cmd) => engine.handle(cmd).await,
                None => {
                    debug!("control channel closed");
                    commands_open = false;
                }
            },

            _ = sleep_until(deadline.unwrap_or_else(|| Instant::now() + IDLE_WAKE)), if deadline.is_some() => {
                engine.fire_due().await;
            }

            Some(list) = refresh_rx.recv() => engine.apply_refresh(list).await,
        }
    }
    Ok(())
}

struct Engine {
    ctx: RotationContext,
    state: RotationState,
    timers: TimerQueue<Timer>,
    refresh_tx: Sender<Vec<CatalogItem>>,
    refreshing: bool,
    daily_target: Option<DateTime<Utc>>,
}

impl Engine {
    fn new(ctx: RotationContext, initial: Vec<CatalogItem>, refresh_tx: Sender<Vec<CatalogItem>>) -> Self {
        Self {
            ctx,
            state: RotationState::new(initial),
            timers: TimerQueue::new(),
            refresh_tx,
            refreshing: false,
            daily_target: None,
        }
    }

    async fn handle(&mut self, cmd: RotationCommand) {
        debug!(?cmd, "control command");
        match cmd {
            RotationCommand::Next => self.show(Step::Forward).await,
            RotationCommand::Previous => self.show(Step::Backward).await,
            RotationCommand::OpenTrailer => self.open_trailer(),
            RotationCommand::RefreshNow => self.start_refresh("manual"),
            RotationCommand::Quit => {}
        }
    }

    async fn fire_due(&mut self) {
        while let Some((handle, timer)) = self.timers.pop_due(Instant::now()) {
            match timer {
                Timer::Advance => {
                    if self.state.pending() == Some(handle) {
                        self.state.take_pending();
                    }
                    self.show(Step::Forward).await;
                }
                Timer::DailyRefresh => {
                    let fired = self.daily_target.unwrap_or_else(Utc::now);
                    self.arm_daily_refresh(fired.max(Utc::now()));
                    self.start_refresh("daily");
                }
                Timer::Restart => {
                    info!("restart interval elapsed; relaunching");
                    (self.ctx.restart)();
                    self.arm_restart();
                }
            }
        }
    }

    fn arm_daily_refresh(&mut self, after: DateTime<Utc>) {
        let settings = &self.ctx.settings;
        let target = next_refresh_after(after, settings.daily_refresh_at, settings.timezone);
        let delay = delay_until(target, Utc::now());
        self.timers.schedule_in(delay, Timer::DailyRefresh);
        self.daily_target = Some(target);
        info!(at = %target, in_secs = delay.as_secs(), "daily refresh scheduled");
    }

    fn arm_restart(&mut self) {
        if let Some(interval) = self.ctx.settings.restart_interval {
            self.timers.schedule_in(interval, Timer::Restart);
            debug!(in_secs = interval.as_secs(), "restart scheduled");
        }
    }

    fn start_refresh(&mut self, reason: &'static str) {
        if self.refreshing {
            info!(reason, "refresh already in progress");
            return;
        }
        self.refreshing = true;
        info!(reason, "refreshing catalog");
        let curator = self.ctx.curator.clone();
        let tx = self.refresh_tx.clone();
        let mut rng = StdRng::from_rng(&mut self.ctx.rng);
        let today = self.ctx.settings.today();
        tokio::spawn(async move {
            let list = curator
                .build_rotation_list(CurationMode::Refresh, today, &mut rng)
                .await;
            if tx.send(list).await.is_err() {
                debug!("rotation loop gone; refresh result discarded");
            }
        });
    }

    async fn apply_refresh(&mut self, list: Vec<CatalogItem>) {
        self.refreshing = false;
        if list.is_empty() {
            warn!(kept = self.state.len(), "refresh returned nothing; keeping current list");
            return;
        }
        info!(count = list.len(), "rotation list replaced");
        self.state.replace(list);
        self.show(Step::Stay).await;
    }

    fn disarm_advance(&mut self) {
        if let Some(handle) = self.state.take_pending() {
            self.timers.cancel(handle);
        }
    }

    fn step(&mut self, step: Step) {
        match step {
            Step::Stay => {}
            Step::Forward => {
                self.state.advance();
            }
            Step::Backward => {
                self.state.retreat();
            }
        }
    }

    async fn show(&mut self, step: Step) {
        self.disarm_advance();
        let len = self.state.len();
        if len == 0 {
            self.ctx.presenter.present(&Screen::placeholder()).await;
            return;
        }
        self.step(step);

        let skip = if step == Step::Backward { Step::Backward } else { Step::Forward };
        let min_width = self.ctx.settings.min_width;
        let mut attempts = 1;
        let (key, artwork) = loop {
            let Some(key) = self.state.current().map(|item| item.poster_key.clone()) else {
                return;
            };
            let artwork = self.ctx.cache.get_artwork(&key).await;
            let eligible = artwork.as_ref().is_some_and(|a| a.width() >= min_width);
            if eligible || attempts >= len {
                break (key, artwork);
            }
            debug!(%key, "artwork unavailable or too small; skipping");
            attempts += 1;
            self.step(skip);
        };

        let color = self.ctx.cache.get_dominant_color(&key).await;
        let Some(item) = self.state.current_mut() else {
            return;
        };
        if color != Rgb::BLACK {
            item.dominant_color = Some(color);
        }
        let slide = match &artwork {
            Some(a) => Slide::new(item, a.path.clone(), a.width(), a.height()),
            None => Slide::new(item, self.ctx.cache.artwork_path(&key), 0, 0),
        };
        self.ctx.presenter.present(&Screen::Poster(slide)).await;
        self.ctx.light.sync_color(color);

        let handle = self.timers.schedule_in(self.ctx.settings.dwell, Timer::Advance);
        self.state.set_pending(handle);
    }

    fn open_trailer(&self) {
        let Some(item) = self.state.current() else {
            info!("nothing on screen; no trailer to open");
            return;
        };
        let (id, title) = (item.id, item.title.clone());
        let curator = self.ctx.curator.clone();
        let opener = self.ctx.opener.clone();
        tokio::spawn(async move {
            match curator.trailer_for(id).await {
                Some(url) => opener.open(&url),
                None => info!(id, %title, "no trailer available"),
            }
        });
    }
}
