use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use domain::services::{derive_status_now, violation_status};
use fleet_tracker::bridge::{forward_lines, ChannelSurface};
use fleet_tracker::client::HttpTrackingApi;
use fleet_tracker::config::Config;
use fleet_tracker::logging::init_logging;
use fleet_tracker::session::{SessionOptions, Snapshot, TrackingSession};

/// Runs one tracking session over stdio: map messages are written to stdout
/// as JSON lines, surface events are read from stdin.
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging);

    info!("Starting Fleet Tracker v{}", env!("CARGO_PKG_VERSION"));
    info!(
        base_url = %config.api.base_url,
        entities = config.tracking.entity_ids.len(),
        include_layers = config.tracking.include_layers,
        "Tracking configured"
    );

    let api = Arc::new(HttpTrackingApi::new(config.api.clone())?);
    let (surface, outbound) = ChannelSurface::new();
    let writer = tokio::spawn(forward_lines(outbound, tokio::io::stdout()));
    let options = SessionOptions::from_config(&config.tracking);

    let mut session = TrackingSession::spawn(api, surface, options);
    tokio::spawn(log_snapshots(session.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if session.inbound(line).is_err() {
                        warn!("Tracking session closed");
                        break;
                    }
                }
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read input");
                    break;
                }
            },
        }
    }

    session.shutdown().await;
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to write map messages"),
        Err(e) => warn!(error = %e, "Output task ended abnormally"),
    }
    info!("Fleet Tracker stopped");

    Ok(())
}

async fn log_snapshots(mut snapshots: watch::Receiver<Snapshot>) {
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        info!(
            state = ?snapshot.state,
            generation = snapshot.generation,
            entities = snapshot.entities.len(),
            failures = snapshot.failures.len(),
            error = ?snapshot.error,
            "Snapshot updated"
        );
        for geofence in &snapshot.geofences {
            debug!(
                geofence_id = geofence.geofence_id,
                status = %derive_status_now(geofence),
                violation = %violation_status(geofence),
                "Geofence status"
            );
        }
    }
}
