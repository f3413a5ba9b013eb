//! Served-request and byte meters behind the plain-text stats report.
//!
//! # Design Decisions
//! - Each meter keeps a count plus 1/5/15-minute exponentially weighted rates
//!   and a mean rate, all per second
//! - Rates tick every five seconds, advanced lazily on the next mark or read
//!   so no background task is needed
//! - A mutex per meter serializes concurrent marks from request tasks

use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(5);

/// Sink the proxy handler reports to. Called concurrently from many requests.
pub trait ProxyMetrics: Send + Sync {
    /// One request was received.
    fn add_served(&self);

    /// `count` body bytes were sent to a client.
    fn add_bytes(&self, count: u64);
}

#[derive(Debug, Clone, Copy)]
struct Ewma {
    alpha: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn new(minutes: f64) -> Self {
        Self {
            alpha: 1.0 - (-TICK.as_secs_f64() / 60.0 / minutes).exp(),
            rate: 0.0,
            initialized: false,
        }
    }

    fn tick(&mut self, count: u64) {
        let instant = count as f64 / TICK.as_secs_f64();
        if self.initialized {
            self.rate += self.alpha * (instant - self.rate);
        } else {
            self.rate = instant;
            self.initialized = true;
        }
    }

    /// Apply `ticks` empty intervals at once.
    fn decay(&mut self, ticks: u64) {
        if self.initialized && ticks > 0 {
            self.rate *= (1.0 - self.alpha).powf(ticks as f64);
        }
    }
}

#[derive(Debug)]
struct MeterState {
    count: u64,
    uncounted: u64,
    rates: [Ewma; 3],
    last_tick: Instant,
}

impl MeterState {
    fn advance(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let ticks = (elapsed.as_nanos() / TICK.as_nanos()) as u64;
        if ticks == 0 {
            return;
        }

        let uncounted = std::mem::take(&mut self.uncounted);
        for ewma in self.rates.iter_mut() {
            ewma.tick(uncounted);
            ewma.decay(ticks - 1);
        }
        self.last_tick += TICK.saturating_mul(ticks.min(u32::MAX as u64) as u32);
    }
}

/// Point-in-time view of a meter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSnapshot {
    pub count: u64,
    pub rate1: f64,
    pub rate5: f64,
    pub rate15: f64,
    pub rate_mean: f64,
}

/// Counts events and tracks their rate.
#[derive(Debug)]
pub struct Meter {
    start: Instant,
    state: Mutex<MeterState>,
}

impl Meter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(start: Instant) -> Self {
        Self {
            start,
            state: Mutex::new(MeterState {
                count: 0,
                uncounted: 0,
                rates: [Ewma::new(1.0), Ewma::new(5.0), Ewma::new(15.0)],
                last_tick: start,
            }),
        }
    }

    pub fn mark(&self, n: u64) {
        self.mark_at(n, Instant::now());
    }

    fn mark_at(&self, n: u64, now: Instant) {
        let mut state = self.state.lock().expect("meter mutex poisoned");
        state.advance(now);
        state.count += n;
        state.uncounted += n;
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> MeterSnapshot {
        let mut state = self.state.lock().expect("meter mutex poisoned");
        state.advance(now);

        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        let rate_mean = if elapsed > 0.0 {
            state.count as f64 / elapsed
        } else {
            0.0
        };

        MeterSnapshot {
            count: state.count,
            rate1: state.rates[0].rate,
            rate5: state.rates[1].rate,
            rate15: state.rates[2].rate,
            rate_mean,
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

/// Meters for requests served ("clients") and bytes transferred ("bytes").
#[derive(Debug, Default)]
pub struct ProxyStats {
    clients: Meter,
    bytes: Meter,
}

impl ProxyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clients(&self) -> MeterSnapshot {
        self.clients.snapshot()
    }

    pub fn bytes(&self) -> MeterSnapshot {
        self.bytes.snapshot()
    }

    /// Render the plain-text report served on the stats path.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (name, snap) in [("clients", self.clients()), ("bytes", self.bytes())] {
            let _ = writeln!(out, "meter {name}");
            let _ = writeln!(out, "  count:       {:>9}", snap.count);
            let _ = writeln!(out, "  1-min rate:  {:>12.2}", snap.rate1);
            let _ = writeln!(out, "  5-min rate:  {:>12.2}", snap.rate5);
            let _ = writeln!(out, "  15-min rate: {:>12.2}", snap.rate15);
            let _ = writeln!(out, "  mean rate:   {:>12.2}", snap.rate_mean);
        }
        out
    }
}

impl ProxyMetrics for ProxyStats {
    fn add_served(&self) {
        self.clients.mark(1);
    }

    fn add_bytes(&self, count: u64) {
        if count > 0 {
            self.bytes.mark(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_meter_counts() {
        let meter = Meter::new();
        meter.mark(1);
        meter.mark(4);
        assert_eq!(meter.snapshot().count, 5);
    }

    #[test]
    fn test_rates_start_after_first_tick() {
        let start = Instant::now();
        let meter = Meter::starting_at(start);
        meter.mark_at(50, start);

        let before = meter.snapshot_at(start + Duration::from_secs(1));
        assert_eq!(before.rate1, 0.0);

        // 50 events in one 5s tick is 10/s
        let after = meter.snapshot_at(start + TICK);
        assert!((after.rate1 - 10.0).abs() < 1e-9);
        assert!((after.rate5 - 10.0).abs() < 1e-9);
        assert!((after.rate15 - 10.0).abs() < 1e-9);
        assert!((after.rate_mean - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_rates_decay_while_idle() {
        let start = Instant::now();
        let meter = Meter::starting_at(start);
        meter.mark_at(50, start);
        let first = meter.snapshot_at(start + TICK);

        let later = meter.snapshot_at(start + Duration::from_secs(5 * 60));
        assert!(later.rate1 < first.rate1);
        assert!(later.rate15 < first.rate15);
        // the short window forgets faster than the long one
        assert!(later.rate1 < later.rate5);
        assert!(later.rate5 < later.rate15);
        assert_eq!(later.count, 50);
    }

    #[test]
    fn test_zero_bytes_not_recorded() {
        let stats = ProxyStats::new();
        stats.add_bytes(0);
        stats.add_bytes(128);
        stats.add_served();
        assert_eq!(stats.bytes().count, 128);
        assert_eq!(stats.clients().count, 1);
    }

    #[test]
    fn test_concurrent_marks() {
        let stats = Arc::new(ProxyStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.add_served();
                        stats.add_bytes(2);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.clients().count, 8000);
        assert_eq!(stats.bytes().count, 16000);
    }

    #[test]
    fn test_report_layout() {
        let stats = ProxyStats::new();
        stats.add_served();
        let report = stats.report();

        assert!(report.starts_with("meter clients\n"));
        assert!(report.contains("\nmeter bytes\n"));
        assert!(report.contains("  count:               1\n"));
        assert_eq!(report.matches("1-min rate:").count(), 2);
        assert_eq!(report.matches("mean rate:").count(), 2);
    }
}
