//! # Stats collector
//!
//! Lock-free counters a `Service` updates from its worker threads and a
//! caller can read from anywhere without synchronizing with them.
//! Counters use relaxed ordering: they're independent tallies, not
//! guards for other memory, so there's nothing to synchronize-with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    pub packets_transmitted: u64,
    pub packets_dropped: u64,
    pub packets_passed: u64,
    pub bytes_received: u64,
    pub bytes_transmitted: u64,
    pub errors: u64,
}

impl StatsSnapshot {
    /// Received bytes per second since the collector was created.
    pub fn receive_rate_bytes_per_sec(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            0.0
        } else {
            self.bytes_received as f64 / elapsed_secs
        }
    }

    /// Transmitted bytes per second since the collector was created.
    pub fn transmit_rate_bytes_per_sec(&self, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            0.0
        } else {
            self.bytes_transmitted as f64 / elapsed_secs
        }
    }
}

/// Atomic packet/byte counters, one instance shared across a service's
/// worker threads via `Arc`.
#[derive(Debug, Default)]
pub struct Stats {
    packets_received: AtomicU64,
    packets_transmitted: AtomicU64,
    packets_dropped: AtomicU64,
    packets_passed: AtomicU64,
    bytes_received: AtomicU64,
    bytes_transmitted: AtomicU64,
    errors: AtomicU64,
    start: Option<Instant>,
}

impl Stats {
    pub fn new() -> Self {
        Stats {
            start: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_received(&self, bytes: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_transmitted(&self, bytes: u64) {
        self.packets_transmitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_transmitted.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_passed(&self) {
        self.packets_passed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_transmitted: self.packets_transmitted.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            packets_passed: self.packets_passed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_transmitted: self.bytes_transmitted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Seconds since this collector was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.record_received(64);
        stats.record_received(128);
        stats.record_dropped();
        stats.record_transmitted(32);
        stats.record_passed();
        stats.record_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.packets_received, 2);
        assert_eq!(snapshot.bytes_received, 192);
        assert_eq!(snapshot.packets_dropped, 1);
        assert_eq!(snapshot.packets_transmitted, 1);
        assert_eq!(snapshot.bytes_transmitted, 32);
        assert_eq!(snapshot.packets_passed, 1);
        assert_eq!(snapshot.errors, 1);
    }

    #[test]
    fn rate_is_zero_for_nonpositive_elapsed() {
        let snapshot = StatsSnapshot {
            bytes_received: 1000,
            ..Default::default()
        };
        assert_eq!(snapshot.receive_rate_bytes_per_sec(0.0), 0.0);
    }
}
