//! Structured telemetry: a non-blocking event router plus hot counters.
//!
//! Events carry a severity and a category tag and are fanned out to
//! pluggable sinks, each drained by its own thread so the simulation loop
//! never blocks on telemetry I/O. The counters are plain atomics, read
//! synchronously by the diagnostics endpoint.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// One routed telemetry event.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub severity: Severity,
    /// Coarse grouping: `commands`, `loop`, `effects`, `sessions`.
    pub category: &'static str,
    /// Event name, stable for dashboards.
    pub name: &'static str,
    pub fields: serde_json::Value,
}

/// A telemetry consumer. Each registered sink gets every event on its own
/// drain thread.
pub trait TelemetrySink: Send + 'static {
    fn record(&mut self, event: &TelemetryEvent);
}

/// Sink that forwards events into the tracing log.
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&mut self, event: &TelemetryEvent) {
        match event.severity {
            Severity::Debug => tracing::debug!(
                category = event.category,
                name = event.name,
                fields = %event.fields,
                "telemetry"
            ),
            Severity::Info => tracing::info!(
                category = event.category,
                name = event.name,
                fields = %event.fields,
                "telemetry"
            ),
            Severity::Warn => tracing::warn!(
                category = event.category,
                name = event.name,
                fields = %event.fields,
                "telemetry"
            ),
            Severity::Error => tracing::error!(
                category = event.category,
                name = event.name,
                fields = %event.fields,
                "telemetry"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Hot-path counters, shared across the server.
#[derive(Debug, Default)]
pub struct Counters {
    pub command_drops: AtomicU64,
    pub tick_overruns: AtomicU64,
    pub ack_regressions: AtomicU64,
    pub effect_impacts: AtomicU64,
    pub effect_parity_flushes: AtomicU64,
    pub frames_sent: AtomicU64,
    pub disconnects: AtomicU64,
    /// Latest command-buffer occupancy gauge.
    pub queue_occupancy: AtomicUsize,
}

impl Counters {
    /// JSON snapshot for the diagnostics endpoint.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "commandDrops": self.command_drops.load(Ordering::Relaxed),
            "tickOverruns": self.tick_overruns.load(Ordering::Relaxed),
            "ackRegressions": self.ack_regressions.load(Ordering::Relaxed),
            "effectImpacts": self.effect_impacts.load(Ordering::Relaxed),
            "effectParityFlushes": self.effect_parity_flushes.load(Ordering::Relaxed),
            "framesSent": self.frames_sent.load(Ordering::Relaxed),
            "disconnects": self.disconnects.load(Ordering::Relaxed),
            "queueOccupancy": self.queue_occupancy.load(Ordering::Relaxed),
        })
    }
}

// ---------------------------------------------------------------------------
// Telemetry router
// ---------------------------------------------------------------------------

struct SinkWorker {
    tx: mpsc::Sender<TelemetryEvent>,
    handle: JoinHandle<()>,
}

/// The router handed around the server. Cloning shares counters and
/// sink channels.
#[derive(Clone)]
pub struct Telemetry {
    pub counters: Arc<Counters>,
    workers: Arc<Vec<SinkWorkerHandle>>,
}

#[derive(Clone)]
struct SinkWorkerHandle {
    tx: mpsc::Sender<TelemetryEvent>,
}

/// Owns the drain threads; dropping it (after all `Telemetry` clones)
/// closes the channels and lets the threads exit.
pub struct TelemetryGuard {
    workers: Vec<SinkWorker>,
}

impl Telemetry {
    /// Build a router over the given sinks.
    pub fn new(sinks: Vec<Box<dyn TelemetrySink>>) -> (Self, TelemetryGuard) {
        let mut workers = Vec::new();
        let mut handles = Vec::new();
        for mut sink in sinks {
            let (tx, rx) = mpsc::channel::<TelemetryEvent>();
            let handle = std::thread::spawn(move || {
                while let Ok(event) = rx.recv() {
                    sink.record(&event);
                }
            });
            handles.push(SinkWorkerHandle { tx: tx.clone() });
            workers.push(SinkWorker { tx, handle });
        }
        (
            Self {
                counters: Arc::new(Counters::default()),
                workers: Arc::new(handles),
            },
            TelemetryGuard { workers },
        )
    }

    /// Router with the default log sink.
    pub fn with_log_sink() -> (Self, TelemetryGuard) {
        Self::new(vec![Box::new(LogSink)])
    }

    /// Fan an event out to every sink without blocking. A sink whose
    /// thread has died just misses the event.
    pub fn emit(&self, event: TelemetryEvent) {
        for worker in self.workers.iter() {
            let _ = worker.tx.send(event.clone());
        }
    }

    pub fn emit_warn(&self, category: &'static str, name: &'static str, fields: serde_json::Value) {
        self.emit(TelemetryEvent {
            severity: Severity::Warn,
            category,
            name,
            fields,
        });
    }

    pub fn emit_info(&self, category: &'static str, name: &'static str, fields: serde_json::Value) {
        self.emit(TelemetryEvent {
            severity: Severity::Info,
            category,
            name,
            fields,
        });
    }
}

impl TelemetryGuard {
    /// Wait for the sink threads to drain and exit. Call after the last
    /// `Telemetry` clone is gone.
    pub fn join(self) {
        for worker in self.workers {
            drop(worker.tx);
            let _ = worker.handle.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sink that stores event names for assertions.
    struct Capture(Arc<Mutex<Vec<&'static str>>>);

    impl TelemetrySink for Capture {
        fn record(&mut self, event: &TelemetryEvent) {
            self.0.lock().unwrap().push(event.name);
        }
    }

    #[test]
    fn events_reach_every_sink() {
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let (telemetry, guard) = Telemetry::new(vec![
            Box::new(Capture(seen_a.clone())),
            Box::new(Capture(seen_b.clone())),
        ]);

        telemetry.emit_warn("commands", "command_dropped", serde_json::json!({"n": 1}));
        telemetry.emit_info("loop", "tick_budget_alarm", serde_json::json!({}));

        drop(telemetry);
        guard.join();

        assert_eq!(*seen_a.lock().unwrap(), vec!["command_dropped", "tick_budget_alarm"]);
        assert_eq!(*seen_b.lock().unwrap(), vec!["command_dropped", "tick_budget_alarm"]);
    }

    #[test]
    fn counters_snapshot_shape() {
        let (telemetry, guard) = Telemetry::with_log_sink();
        telemetry.counters.command_drops.fetch_add(3, Ordering::Relaxed);
        telemetry.counters.queue_occupancy.store(7, Ordering::Relaxed);

        let snapshot = telemetry.counters.snapshot();
        assert_eq!(snapshot["commandDrops"], 3);
        assert_eq!(snapshot["queueOccupancy"], 7);

        drop(telemetry);
        guard.join();
    }
}
