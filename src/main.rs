//! Deskboard: data refresher for an always-on desk display.
//!
//! Single-binary Tokio application that:
//! 1. Loads the board configuration
//! 2. Builds the Open-Meteo, TMB and Yahoo Finance clients
//! 3. Runs the refresh scheduler on its own task
//! 4. Polls the published state the way a screen would and logs it

mod config;
mod display;

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tracing::{error, info, warn};

use common::{BoardConfig, Domain};
use open_meteo_client::OpenMeteoClient;
use refresh::{BoardHandle, Scheduler, SchedulerSources, SelectionState};
use tmb_client::TmbClient;
use yahoo_quote_client::YahooQuoteClient;

/// Desk display data refresher
#[derive(Parser)]
#[command(name = "deskboard", about = "Weather, transit and quote refresher for a desk display")]
struct Cli {
    /// Geocode the primary city and exit.
    #[arg(long)]
    check_sources: bool,

    /// Run a single scheduler tick, log what was published, and exit.
    #[arg(long)]
    dry_run: bool,

    /// Cycle the selected city and stop every N seconds.
    #[arg(long)]
    rotate_secs: Option<u64>,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const DISPLAY_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "deskboard=info,refresh=info,open_meteo_client=info,tmb_client=info,yahoo_quote_client=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("Deskboard starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Cities: {:?}", cfg.cities);
    info!("Stops: {:?}", cfg.stops);
    info!("Symbols: {:?}", cfg.symbols);
    info!(
        "Timing: tick={}ms spacing={}ms weather={}s/{}s transit={}s/{}s quotes={}s",
        cfg.timing.tick_interval_ms,
        cfg.timing.min_request_spacing_ms,
        cfg.timing.weather_active_stale_secs,
        cfg.timing.weather_background_stale_secs,
        cfg.timing.transit_active_stale_secs,
        cfg.timing.transit_background_stale_secs,
        cfg.timing.quotes_refresh_secs,
    );

    let timeout = Duration::from_secs(cfg.http_timeout_secs);
    let weather = match OpenMeteoClient::new(timeout) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Open-Meteo client initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    // ── Check-sources mode ───────────────────────────────────────────
    if cli.check_sources {
        info!("Running source check...");
        let Some(city) = cfg.cities.first() else {
            error!("No city configured");
            std::process::exit(1);
        };
        match weather.geocode(city).await {
            Ok(location) => {
                info!(
                    "✅ Geocoded {} -> {} ({:.4}, {:.4})",
                    location.query, location.name, location.lat, location.lon
                );
            }
            Err(e) => {
                error!("❌ Source check failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let transit = match TmbClient::new(cfg.tmb_app_id.clone(), cfg.tmb_app_key.clone(), timeout) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("TMB client initialization failed: {}", e);
            std::process::exit(1);
        }
    };
    let quotes = match YahooQuoteClient::new(timeout) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Yahoo client initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    // ── Shared state ─────────────────────────────────────────────────
    let selection = Arc::new(SelectionState::new());
    selection.set_transit_visible(!cfg.stops.is_empty());

    let sources = SchedulerSources {
        weather,
        transit,
        quotes,
    };
    let (mut scheduler, handle) = Scheduler::new(
        &cfg,
        sources,
        selection.clone(),
        Arc::new(display::LogIndicator::default()),
    );

    // ── Dry-run mode ─────────────────────────────────────────────────
    if cli.dry_run {
        info!("Running single dry-run tick...");
        let report = scheduler.tick().await;
        info!(
            "Tick made {} fetches ({} cache hits, {} gated)",
            report.fetch_count(),
            report.cache_hits.len(),
            report.gated.len()
        );
        for attempt in &report.attempted {
            info!(
                "  → {} entity {}: {}",
                attempt.domain,
                attempt.entity,
                if attempt.ok { "ok" } else { "failed" }
            );
        }
        for domain in Domain::ALL {
            if let Some(update) = handle.consume_if_updated(domain).await {
                info!("[{}] {}", domain, display::summarize(&update));
                match display::to_json(&update) {
                    Ok(json) => tracing::debug!("[{}] {}", domain, json),
                    Err(e) => warn!("[{}] could not serialize update: {}", domain, e),
                }
            }
        }
        return;
    }

    // ── Spawn tasks ──────────────────────────────────────────────────
    info!("Spawning tasks...");

    // Task 1: Scheduler
    let scheduler_handle = tokio::spawn(scheduler.run());

    // Task 2: Display consumer
    let display_opts = display::DisplayOptions {
        poll_interval: DISPLAY_POLL_INTERVAL,
        rotate_every: cli.rotate_secs.filter(|s| *s > 0).map(Duration::from_secs),
        cities: cfg.cities.len(),
        stops: cfg.stops.len(),
    };
    let display_handle = tokio::spawn(display::run_display(handle.clone(), selection.clone(), display_opts));

    // Task 3: Heartbeat
    let hb_handle = handle.clone();
    let hb_cfg = cfg.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            heartbeat(&hb_handle, &hb_cfg).await;
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("🚀 Deskboard is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = scheduler_handle => {
            error!("Scheduler task exited: {:?}", r);
        }
        r = display_handle => {
            error!("Display task exited: {:?}", r);
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    info!("Deskboard shut down.");
}

async fn heartbeat(handle: &BoardHandle, cfg: &BoardConfig) {
    let mut parts = Vec::with_capacity(Domain::ALL.len());
    for domain in Domain::ALL {
        let current = handle.peek_current(domain).await;
        let state = if handle.is_fetch_in_flight(domain) {
            "updating"
        } else if current.is_empty() {
            "empty"
        } else {
            "ok"
        };
        parts.push(format!("{}={}", domain, state));
    }
    info!(
        "HEARTBEAT: {} cities={} stops={} symbols={}",
        parts.join(" "),
        cfg.cities.len(),
        cfg.stops.len(),
        cfg.symbols.len()
    );
}
