//! Server configuration from environment variables.
//!
//! Everything has a sensible default; the environment only overrides.
//! A `.env` file is honored in development (loaded by `main`).

use std::net::SocketAddr;
use std::time::Duration;

use gritfall_journal::JournalConfig;

/// Tunables for one server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP/WebSocket listen address.
    pub listen: SocketAddr,
    /// Simulation rate in Hz.
    pub tick_rate: u32,
    /// Catch-up clamp: at most this many tick periods per step.
    pub catchup_max_ticks: u32,
    /// Emit a keyframe every N ticks.
    pub keyframe_interval_ticks: u64,
    /// Journal retention bounds.
    pub journal: JournalConfig,
    /// Command buffer global capacity.
    pub command_capacity: usize,
    /// Command buffer per-actor quota.
    pub per_actor_limit: usize,
    /// Expected heartbeat cadence from clients.
    pub heartbeat_interval: Duration,
    /// Consecutive missed heartbeats before disconnect.
    pub heartbeat_max_missed: u32,
    /// Per-send write deadline.
    pub write_wait: Duration,
    /// Minimum spacing between keyframe requests per client.
    pub keyframe_request_min_interval: Duration,
    /// Tick-budget alarm: duration ratio that counts as an overrun.
    pub budget_threshold_ratio: f64,
    /// Consecutive overruns before the alarm fires.
    pub budget_threshold_streak: u32,
    /// Default world seed.
    pub seed: String,
    /// Expose the profiling endpoint.
    pub enable_pprof: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".parse().expect("static address parses"),
            tick_rate: 15,
            catchup_max_ticks: 4,
            keyframe_interval_ticks: 30,
            journal: JournalConfig::default(),
            command_capacity: 256,
            per_actor_limit: 16,
            heartbeat_interval: Duration::from_secs(2),
            heartbeat_max_missed: 3,
            write_wait: Duration::from_secs(5),
            keyframe_request_min_interval: Duration::from_millis(250),
            budget_threshold_ratio: 0.85,
            budget_threshold_streak: 3,
            seed: "default".to_owned(),
            enable_pprof: false,
        }
    }
}

impl ServerConfig {
    /// Duration of one tick.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate))
    }

    /// Fixed timestep in seconds.
    pub fn fixed_dt(&self) -> f64 {
        1.0 / f64::from(self.tick_rate)
    }

    /// Read overrides from the environment. Unparsable values fall back
    /// to the defaults with a warning rather than refusing to start.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = env_parse::<SocketAddr>("GRITFALL_LISTEN") {
            config.listen = value;
        }
        if let Ok(seed) = std::env::var("GRITFALL_SEED") {
            if !seed.is_empty() {
                config.seed = seed;
            }
        }
        if let Some(value) = env_parse::<u64>("KEYFRAME_INTERVAL_TICKS") {
            config.keyframe_interval_ticks = value.max(1);
        }
        if let Some(value) = env_parse::<usize>("KEYFRAME_JOURNAL_CAPACITY") {
            config.journal.keyframe_capacity = value.max(1);
        }
        if let Some(value) = env_parse::<u64>("KEYFRAME_JOURNAL_MAX_AGE_MS") {
            config.journal.keyframe_max_age = Duration::from_millis(value);
        }
        if let Ok(value) = std::env::var("ENABLE_PPROF_TRACE") {
            config.enable_pprof = matches!(value.as_str(), "1" | "true" | "yes");
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, raw = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
