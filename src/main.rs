use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use walk_tracker::format::{format_distance, format_duration};
use walk_tracker::{
    create_router, AppState, BackgroundReconciler, ChannelLocationProvider, Config, Coordinate,
    FileStore, InProcessScheduler, MemoryStore, SimulatedWalk, TaskOptions, TrackingConfig,
    WalkArchive, WalkSession,
};

#[derive(Parser)]
#[command(name = "walk-tracker", version, about = "Dog walk session tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Config file (extension optional)
        #[arg(short, long, default_value = "config/walk-tracker")]
        config: String,
    },
    /// Record a simulated walk, handing it to the background halfway through
    Simulate {
        /// Number of simulated fixes
        #[arg(long, default_value_t = 20)]
        steps: usize,
        #[arg(long, default_value_t = 37.5)]
        latitude: f64,
        #[arg(long, default_value_t = 127.0)]
        longitude: f64,
        /// Walking speed in meters per second
        #[arg(long, default_value_t = 5.0)]
        speed: f64,
        /// Degrees clockwise from north
        #[arg(long, default_value_t = 90.0)]
        heading: f64,
        /// Delay between fixes in milliseconds
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Serve { config } => serve(&config).await,
        Command::Simulate {
            steps,
            latitude,
            longitude,
            speed,
            heading,
            interval_ms,
        } => {
            let walk = SimulatedWalk::new(Coordinate::new(latitude, longitude))
                .with_speed(speed)
                .with_heading(heading);
            simulate(steps, walk, Duration::from_millis(interval_ms)).await
        }
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let cfg = Config::load(config_path)?;

    info!("Walk Tracker v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Data directory: {}", cfg.storage.data_dir.display());

    let store = Arc::new(FileStore::open(&cfg.storage.data_dir).await?);
    let archive = Arc::new(WalkArchive::new(store));
    let app = create_router(AppState::new(archive, cfg.tracking));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}

async fn simulate(steps: usize, mut walk: SimulatedWalk, interval: Duration) -> Result<()> {
    let tracking = TrackingConfig::default();
    let location = Arc::new(ChannelLocationProvider::granted());
    if let Some(first) = walk.next() {
        location.set_position(first).await;
    }

    let store = Arc::new(MemoryStore::new());
    let scheduler = Arc::new(InProcessScheduler::new(location.clone()));
    let background =
        BackgroundReconciler::new(location.clone(), scheduler, store, tracking.filter()).await?;

    let session = WalkSession::new(location.clone(), tracking);
    session.start().await?;

    let foreground_steps = steps / 2;

    for fix in walk.by_ref().take(foreground_steps) {
        location.push(fix).await;
        tokio::time::sleep(interval).await;
    }

    info!("App backgrounded, handing walk to background task");
    let state = session.hand_off().await?;
    background.claim(state, &TaskOptions::default()).await?;

    for fix in walk.by_ref().take(steps - foreground_steps) {
        location.push(fix).await;
        tokio::time::sleep(interval).await;
    }

    info!("App foregrounded, taking walk back");
    if let Some(state) = background.release().await? {
        session.resume(state).await?;
    }

    let summary = session.stop().await?;

    println!("Walk complete");
    println!("  Duration: {}", format_duration(summary.duration));
    println!("  Distance: {}", format_distance(summary.distance));
    println!("  Points:   {}", summary.path.len());
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
