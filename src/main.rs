use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use poster_frame::cache::CacheService;
use poster_frame::catalog::tmdb::TmdbClient;
use poster_frame::config::Configuration;
use poster_frame::curator::{CurationMode, CurationPolicy, Curator};
use poster_frame::display::{FanOut, LogPresenter, NowShowingFilePresenter, Presenter};
use poster_frame::events::RotationCommand;
use poster_frame::light::{HttpLightSink, LightGate, LightSink, LightSync};
use poster_frame::platform::opener::TrailerOpener;
use poster_frame::platform::restart::RelaunchPlan;
use poster_frame::tasks::rotation::{RestartHook, RotationContext, RotationSettings, today_in};
use poster_frame::tasks::{control, prefetch, rotation};

#[derive(Debug, Parser)]
#[command(
    name = "poster-frame",
    version,
    about = "Rotating movie poster display with ambient light sync"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Curate once, print the rotation order and exit
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Deterministic RNG seed for the category interleave
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,
}

fn init_tracing(verbose: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = match verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            };
            EnvFilter::try_new(format!("info,poster_frame={level}"))
                .context("failed to build log filter")?
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        verbose,
        dry_run,
        seed,
    } = Args::parse();
    init_tracing(verbose)?;

    let relaunch = RelaunchPlan::capture().context("failed to capture relaunch plan")?;

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .with_env_overrides()
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let tmdb = Arc::new(TmdbClient::new(&cfg.catalog)?);
    let cache = Arc::new(
        CacheService::open(&cfg.cache, tmdb.clone())
            .await
            .context("failed to open cache")?,
    );
    let curator = Arc::new(Curator::new(
        tmdb,
        cache.clone(),
        CurationPolicy::from_config(&cfg.catalog, &cfg.rotation),
    ));

    let today = today_in(cfg.schedule.timezone);
    let initial = curator
        .build_rotation_list(CurationMode::Startup, today, &mut rng)
        .await;

    if dry_run {
        print_rotation(&initial);
        return Ok(());
    }

    let initial = prefetch::warm(&cache, initial, cfg.rotation.prefetch_concurrency).await;

    let cancel = CancellationToken::new();
    let (control_tx, control_rx) = mpsc::channel::<RotationCommand>(16);

    // Ctrl-D/Ctrl-C shut down; stdin lines drive navigation.
    let mut tasks = JoinSet::new();
    if io::stdin().is_terminal() {
        tasks.spawn({
            let tx = control_tx.clone();
            let cancel = cancel.clone();
            async move {
                control::run_stdin(tx, cancel)
                    .await
                    .context("stdin control task failed")
            }
        });
    } else {
        tracing::debug!("stdin is not a terminal; skipping command reader");
    }

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let tx = control_tx.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            control::run_signals(tx, cancel)
                .await
                .context("signal control task failed")
        });
    }
    drop(control_tx);

    let gate = LightGate::new(cfg.webhook.initial_tv_state.is_on());
    let light = match &cfg.lighting {
        Some(lighting) => {
            let sink = HttpLightSink::from_config(lighting)?
                .map(|sink| Arc::new(sink) as Arc<dyn LightSink>);
            LightSync::new(gate.clone(), sink, lighting.max_in_flight)
        }
        None => {
            tracing::info!("lighting not configured; light sync disabled");
            LightSync::disabled(gate.clone())
        }
    };

    let webhook = cfg
        .webhook
        .enabled
        .then(|| poster_frame::web::spawn(&cfg.webhook, gate, cancel.clone()));

    let presenter: Arc<dyn Presenter> = match &cfg.rotation.now_showing_path {
        Some(path) => Arc::new(FanOut(vec![
            Arc::new(LogPresenter),
            Arc::new(NowShowingFilePresenter::new(path)),
        ])),
        None => Arc::new(LogPresenter),
    };

    let restart: RestartHook = Arc::new(relaunch.into_hook());
    let ctx = RotationContext {
        curator,
        cache,
        presenter,
        light,
        opener: TrailerOpener::new(cfg.rotation.trailer_command.clone()),
        settings: RotationSettings::from_config(&cfg.rotation, &cfg.schedule),
        restart,
        rng: StdRng::from_rng(&mut rng),
    };

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            rotation::run(ctx, initial, control_rx, cancel)
                .await
                .context("rotation task failed")
        }
    });

    cancel.cancelled().await;

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }
    if let Some(handle) = webhook {
        if let Err(err) = handle.await {
            tracing::error!("webhook join error: {err}");
        }
    }
    Ok(())
}

fn print_rotation(items: &[poster_frame::catalog::CatalogItem]) {
    println!("# rotation dry run\n# items: {}\n", items.len());
    if items.is_empty() {
        println!("({})", poster_frame::display::PLACEHOLDER_MESSAGE);
        return;
    }
    for (idx, item) in items.iter().enumerate() {
        let provider = item.streaming_provider.as_deref().unwrap_or("-");
        println!(
            "  {:>3}: [{:<14}] {} ({}, {})",
            idx + 1,
            item.category.as_str(),
            item.title,
            item.poster_key,
            provider
        );
    }
}
