//! The gritfall-server binary: configuration, tasks, HTTP serving, and
//! graceful shutdown.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use gritfall_server::config::ServerConfig;
use gritfall_server::telemetry::Telemetry;
use gritfall_server::{http, sim, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is a development convenience; absence is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env();
    let listen = config.listen;
    tracing::info!(
        %listen,
        seed = %config.seed,
        tick_rate = config.tick_rate,
        keyframe_interval = config.keyframe_interval_ticks,
        "starting gritfall server"
    );

    let (telemetry, telemetry_guard) = Telemetry::with_log_sink();
    let server = Server::new(config, telemetry);

    let stop = sim::start(server.clone());

    let app = http::router(server.clone());
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {listen}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("http server")?;

    // Stop the loop, release the context, and drain telemetry under a
    // deadline so a lingering session cannot wedge shutdown.
    let _ = stop.send(true);
    drop(server);
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        tokio::task::spawn_blocking(move || telemetry_guard.join()),
    )
    .await;
    Ok(())
}
