//! Orbital Duel - headless match runner
//!
//! Runs one duel between two scripted pilots on the fixed-rate tick loop
//! and logs every event the match emits.

mod pilot;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use orbital_duel::config::Config;
use orbital_duel::game::{
    BroadcastSink, Collaborators, GameEvent, GameMatch, PlayerSlot, ShipLoadout,
};

use crate::pilot::ScriptedPilot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // A configured preset file that fails to load stops startup here
    let presets = config.load_presets()?;
    let preset = presets.lookup(&config.match_config.equipped_preset);

    info!(
        seed = config.match_seed,
        preset = %config.match_config.equipped_preset,
        rounds_to_win = config.match_config.rounds_to_win,
        "Starting headless duel"
    );

    let (sink, events_rx) = BroadcastSink::new(1024);
    let pilot_feeds = [sink.subscribe(), sink.subscribe()];

    let (game, handle) = GameMatch::new(
        Uuid::new_v4(),
        config.match_seed,
        config.match_config.clone(),
        config.physics.clone(),
        preset,
        [ShipLoadout::default(), ShipLoadout::default()],
        Collaborators::headless(sink),
    );

    tokio::spawn(log_events(events_rx));

    for (slot, feed) in [PlayerSlot::One, PlayerSlot::Two].into_iter().zip(pilot_feeds) {
        let pilot = ScriptedPilot::new(
            slot,
            config.match_seed.wrapping_add(slot.index() as u64 + 1),
            handle.input_tx.clone(),
        );
        tokio::spawn(pilot.run(feed));
    }
    drop(handle);

    tokio::select! {
        _ = game.run() => {
            info!("Match finished");
        }
        _ = shutdown_signal() => {
            info!("Received Ctrl+C, stopping match");
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Log every match event as JSON
async fn log_events(mut events: broadcast::Receiver<GameEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "Failed to serialize event");
                        continue;
                    }
                };
                if matches!(event, GameEvent::TrailReleased { .. }) {
                    debug!(event = %json, "Match event");
                } else {
                    info!(event = %json, "Match event");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Ctrl+C handler
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
