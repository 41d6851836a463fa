use crate::cli::{OutputFormat, SortBy, StatusFilter};
use crate::logic::client::list::{render_details, render_fleet};
use crate::logic::client::transport::{FleetTransport, HttpTransport};
use crate::logic::config::ClientConfig;
use crate::logic::store::{DetailState, FleetState, FleetStore, Phase, RobotDetailStore};
use chrono::Utc;
use colored::*;
use std::sync::Arc;
use std::time::Duration;

pub struct ListOptions {
    pub format: OutputFormat,
    pub sort: SortBy,
    pub status: Option<StatusFilter>,
    pub watch: bool,
    /// Seconds between refreshes in watch mode; the configured poll interval when unset
    pub interval: Option<u64>,
    pub extended: bool,
    pub select: Option<String>,
}

pub async fn list(config: &ClientConfig, options: ListOptions) -> anyhow::Result<()> {
    let transport: Arc<dyn FleetTransport> = Arc::new(HttpTransport::from_config(config)?);
    let store = Arc::new(FleetStore::new(transport, config.request_timeout()));
    if options.watch {
        let interval = watch_interval(config, options.interval)?;
        watch(store, interval, &options).await
    } else {
        run_single_fetch(&store, &options).await
    }
}

/// `--interval` overrides the configured poll interval under the same rules
fn watch_interval(config: &ClientConfig, interval: Option<u64>) -> anyhow::Result<Duration> {
    let Some(seconds) = interval else {
        return Ok(config.poll_interval());
    };
    let effective = ClientConfig {
        poll_interval_seconds: seconds,
        ..config.clone()
    };
    effective.validate()?;
    Ok(effective.poll_interval())
}

async fn run_single_fetch(store: &Arc<FleetStore>, options: &ListOptions) -> anyhow::Result<()> {
    store.refresh().await?;
    let state = store.state();
    render_fleet(
        &state.snapshot,
        &state.data_quality,
        &options.format,
        &options.sort,
        &options.status,
        options.extended,
    )?;

    if let Some(robot_id) = &options.select {
        store.select_robot(Some(robot_id));
        let details = RobotDetailStore::for_fleet(store);
        details.refresh().await?;
        if let Some(record) = details.state().details {
            println!();
            render_details(&record, &options.format)?;
        }
    }
    Ok(())
}

/// Poll until Ctrl+C, redrawing whenever the fleet or the selected robot changes
async fn watch(store: Arc<FleetStore>, interval: Duration, options: &ListOptions) -> anyhow::Result<()> {
    println!("{}", "Watch mode enabled. Press Ctrl+C to exit...".bright_cyan().bold());

    let mut fleet_updates = store.subscribe();
    let details = Arc::new(RobotDetailStore::for_fleet(&store));
    let mut detail_updates = details.subscribe();
    store.select_robot(options.select.as_deref());

    let _follower = details.follow();
    let poller = store.start_polling(interval);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = fleet_updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = detail_updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
        let fleet = fleet_updates.borrow_and_update().clone();
        let detail = detail_updates.borrow_and_update().clone();
        if let Err(e) = draw(&fleet, &detail, interval, options) {
            eprintln!("{} {}", "Error:".red().bold(), e);
        }
    }

    poller.shutdown().await;
    Ok(())
}

fn draw(
    fleet: &FleetState,
    detail: &DetailState,
    interval: Duration,
    options: &ListOptions,
) -> anyhow::Result<()> {
    // Nothing useful to draw until the first fetch has finished.
    if fleet.phase == Phase::Loading && fleet.last_refreshed.is_none() {
        return Ok(());
    }

    // Clear screen (ANSI escape code)
    print!("\x1B[2J\x1B[1;1H");
    let refreshed = fleet
        .last_refreshed
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{} {} {}",
        "Last updated:".bright_cyan(),
        refreshed,
        format!("(every {}s, now {})", interval.as_secs(), Utc::now().format("%H:%M:%S")).dimmed()
    );
    if let Some(error) = &fleet.error {
        println!("{} {}", "Error:".red().bold(), error);
    }
    println!();

    render_fleet(
        &fleet.snapshot,
        &fleet.data_quality,
        &options.format,
        &options.sort,
        &options.status,
        options.extended,
    )?;

    if let Some(robot_id) = &detail.robot_id {
        println!();
        match (&detail.phase, &detail.details) {
            (Phase::Loading, _) => println!("{} {}", "Loading details for".dimmed(), robot_id),
            (_, Some(record)) => render_details(record, &options.format)?,
            (_, None) => println!(
                "{} {}",
                "✗".red(),
                detail.error.as_deref().unwrap_or("Failed to load robot details")
            ),
        }
    }
    Ok(())
}
