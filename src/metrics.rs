// Session metrics module
//
// Lock-free counters for the selector and catalog, summarized on shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Playback and catalog counters for one session.
///
/// Uses atomic operations so the catalog (reload thread) and the selector
/// (host main thread) can record without locks.
#[derive(Debug)]
pub struct Metrics {
    /// Selector ticks processed
    pub ticks: AtomicU64,

    /// Ticks skipped because a preemption was active
    pub frozen_ticks: AtomicU64,

    /// Tracks started successfully
    pub starts: AtomicU64,

    /// Host refused or failed to start a track
    pub start_failures: AtomicU64,

    /// Tracks stopped by the selector
    pub stops: AtomicU64,

    /// Self-heal restarts of the intended track
    pub restarts: AtomicU64,

    /// External or stale sounds vetoed
    pub vetoes: AtomicU64,

    /// Times we yielded to other music
    pub yields: AtomicU64,

    /// Record-channel preemptions
    pub record_preemptions: AtomicU64,

    /// Definitions that failed to evaluate and counted as no match
    pub evaluation_errors: AtomicU64,

    /// Discovery runs
    pub discoveries: AtomicU64,

    /// Diagnostics reported by discovery runs
    pub discovery_diagnostics: AtomicU64,

    /// Session start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            frozen_ticks: AtomicU64::new(0),
            starts: AtomicU64::new(0),
            start_failures: AtomicU64::new(0),
            stops: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
            vetoes: AtomicU64::new(0),
            yields: AtomicU64::new(0),
            record_preemptions: AtomicU64::new(0),
            evaluation_errors: AtomicU64::new(0),
            discoveries: AtomicU64::new(0),
            discovery_diagnostics: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frozen_tick(&self) {
        self.frozen_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start(&self) {
        self.starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start_failure(&self) {
        self.start_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_veto(&self) {
        self.vetoes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_yield(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preemption(&self) {
        self.record_preemptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evaluation_error(&self) {
        self.evaluation_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a discovery run and how many diagnostics it produced
    pub fn record_discovery(&self, diagnostics: usize) {
        self.discoveries.fetch_add(1, Ordering::Relaxed);
        self.discovery_diagnostics
            .fetch_add(diagnostics as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of ticks spent frozen behind a preemption
    pub fn frozen_ratio(&self) -> f64 {
        let ticks = self.ticks.load(Ordering::Relaxed);
        if ticks > 0 {
            self.frozen_ticks.load(Ordering::Relaxed) as f64 / ticks as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Ticks: {} ({} frozen, {:.1}%)",
            self.ticks.load(Ordering::Relaxed),
            self.frozen_ticks.load(Ordering::Relaxed),
            self.frozen_ratio() * 100.0
        );
        tracing::info!(
            "Playback: {} starts, {} failed, {} stops, {} restarts",
            self.starts.load(Ordering::Relaxed),
            self.start_failures.load(Ordering::Relaxed),
            self.stops.load(Ordering::Relaxed),
            self.restarts.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Arbitration: {} vetoes, {} yields, {} record preemptions",
            self.vetoes.load(Ordering::Relaxed),
            self.yields.load(Ordering::Relaxed),
            self.record_preemptions.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Catalog: {} discoveries, {} diagnostics, {} evaluation errors",
            self.discoveries.load(Ordering::Relaxed),
            self.discovery_diagnostics.load(Ordering::Relaxed),
            self.evaluation_errors.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
