//! The simulation loop and heartbeat monitor tasks.
//!
//! The loop is the only place [`Server::run_tick`] is called in
//! production. It sleeps exclusively on its ticker; the measured elapsed
//! time is clamped to `catchup_max_ticks` tick periods, so a stall (GC
//! pause, suspended laptop) advances the world a bounded amount instead
//! of fast-forwarding.

use std::time::Instant;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::SharedServer;

/// Run the fixed-rate simulation loop until the stop signal flips.
pub async fn run_loop(server: SharedServer, mut stop: watch::Receiver<bool>) {
    let period = server.config.tick_period();
    let max_dt = period.mul_f64(f64::from(server.config.catchup_max_ticks));

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() fires immediately; consume the first tick so the loop
    // starts one period after spawn.
    ticker.tick().await;

    let mut last = Instant::now();
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = stop.changed() => {
                if result.is_err() || *stop.borrow() {
                    tracing::info!("simulation loop stopping");
                    break;
                }
                continue;
            }
        }

        let now = Instant::now();
        let raw = now.duration_since(last);
        last = now;

        let clamped = raw > max_dt;
        let dt = if clamped { max_dt } else { raw };
        let report = server.run_tick(dt.as_secs_f64(), clamped);

        if clamped {
            tracing::debug!(
                tick = report.tick,
                raw_ms = raw.as_millis() as u64,
                "catch-up clamped"
            );
        }
    }
}

/// Watch subscriber heartbeats; three missed intervals disconnect the
/// session, which removes the player and broadcasts the purge patches.
pub async fn run_heartbeat_monitor(server: SharedServer, mut stop: watch::Receiver<bool>) {
    let interval = server.config.heartbeat_interval;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = stop.changed() => {
                if result.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
        }

        let expired = server.coordinator.sweep_heartbeats(
            Instant::now(),
            interval,
            server.config.heartbeat_max_missed,
        );
        for player_id in expired {
            tracing::warn!(player = %player_id, "heartbeat timeout");
            server.disconnect(&player_id, "heartbeat_timeout");
        }
    }
}

/// Spawn both background tasks. Returns the stop sender; flipping it to
/// `true` (or dropping it) winds the tasks down.
pub fn start(server: SharedServer) -> watch::Sender<bool> {
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(run_loop(server.clone(), stop_rx.clone()));
    tokio::spawn(run_heartbeat_monitor(server, stop_rx));
    stop_tx
}
