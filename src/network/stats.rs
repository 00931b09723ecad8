//! Server Statistics
//!
//! Operational counters. Nothing here feeds back into the simulation.
//! Counters are atomics shared between connection tasks and the tick;
//! the rolling per-tick window is owned by whoever runs the tick.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Ticks averaged by [`TickWindow`].
pub const AVERAGE_WINDOW: usize = 30;

/// Process-wide counters.
#[derive(Debug)]
pub struct ServerStats {
    ticks: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_dropped: AtomicU64,
    bogus_messages: AtomicU64,
    players_joined: AtomicU64,
    players_left: AtomicU64,
    players_rejected: AtomicU64,
    players: AtomicU64,
    started_at: Instant,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            bogus_messages: AtomicU64::new(0),
            players_joined: AtomicU64::new(0),
            players_left: AtomicU64::new(0),
            players_rejected: AtomicU64::new(0),
            players: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Count one inbound record.
    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count one outbound record handed to a connection.
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count one outbound record that could not be queued.
    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one malformed record.
    pub fn record_bogus(&self) {
        self.bogus_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one admitted player.
    pub fn record_joined(&self) {
        self.players_joined.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one departed player.
    pub fn record_left(&self) {
        self.players_left.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one refused connection.
    pub fn record_rejected(&self) {
        self.players_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one completed tick.
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the current population gauge.
    pub fn set_players(&self, players: usize) {
        self.players.store(players as u64, Ordering::Relaxed);
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Malformed records seen so far.
    pub fn bogus_messages(&self) -> u64 {
        self.bogus_messages.load(Ordering::Relaxed)
    }

    /// Connections refused so far.
    pub fn players_rejected(&self) -> u64 {
        self.players_rejected.load(Ordering::Relaxed)
    }

    /// Outbound records dropped so far.
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    /// Capture every counter plus the rolling averages.
    pub fn snapshot(&self, window: &TickWindow) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            ticks: self.ticks.load(Ordering::Relaxed),
            players: self.players.load(Ordering::Relaxed),
            players_joined: self.players_joined.load(Ordering::Relaxed),
            players_left: self.players_left.load(Ordering::Relaxed),
            players_rejected: self.players_rejected.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            bogus_messages: self.bogus_messages.load(Ordering::Relaxed),
            avg_tick_ms: window.average_duration().as_secs_f64() * 1000.0,
            avg_messages_per_tick: window.average_messages(),
            avg_bytes_per_tick: window.average_bytes(),
        }
    }
}

/// One tick's cost.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickSample {
    /// Wall time spent inside the tick
    pub duration: Duration,
    /// Records queued for sending
    pub messages: u64,
    /// Bytes queued for sending
    pub bytes: u64,
}

/// Rolling window over the last [`AVERAGE_WINDOW`] ticks.
#[derive(Clone, Debug)]
pub struct TickWindow {
    samples: VecDeque<TickSample>,
    capacity: usize,
}

impl Default for TickWindow {
    fn default() -> Self {
        Self::new(AVERAGE_WINDOW)
    }
}

impl TickWindow {
    /// Create a window keeping at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Add a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: TickSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if no tick was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean tick duration.
    pub fn average_duration(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().map(|s| s.duration).sum();
        total / self.samples.len() as u32
    }

    /// Mean records sent per tick.
    pub fn average_messages(&self) -> f64 {
        self.mean(|s| s.messages)
    }

    /// Mean bytes sent per tick.
    pub fn average_bytes(&self) -> f64 {
        self.mean(|s| s.bytes)
    }

    fn mean(&self, field: impl Fn(&TickSample) -> u64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: u64 = self.samples.iter().map(field).sum();
        total as f64 / self.samples.len() as f64
    }
}

/// Point-in-time view of the counters, logged as JSON.
#[derive(Clone, Debug, Serialize)]
pub struct StatsSnapshot {
    /// Seconds since start
    pub uptime_secs: u64,
    /// Ticks completed
    pub ticks: u64,
    /// Current population
    pub players: u64,
    /// Players admitted
    pub players_joined: u64,
    /// Players gone
    pub players_left: u64,
    /// Connections refused at admission
    pub players_rejected: u64,
    /// Records queued for sending
    pub messages_sent: u64,
    /// Records received
    pub messages_received: u64,
    /// Bytes queued for sending
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Records dropped on full or closed outboxes
    pub messages_dropped: u64,
    /// Malformed records
    pub bogus_messages: u64,
    /// Mean tick duration over the window, milliseconds
    pub avg_tick_ms: f64,
    /// Mean records sent per tick over the window
    pub avg_messages_per_tick: f64,
    /// Mean bytes sent per tick over the window
    pub avg_bytes_per_tick: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ServerStats::new();
        stats.record_received(3);
        stats.record_received(9);
        stats.record_sent(14);
        stats.record_dropped();
        stats.record_bogus();
        stats.record_joined();
        stats.record_rejected();
        stats.set_players(1);
        stats.record_tick();

        let snap = stats.snapshot(&TickWindow::default());
        assert_eq!(snap.messages_received, 2);
        assert_eq!(snap.bytes_received, 12);
        assert_eq!(snap.messages_sent, 1);
        assert_eq!(snap.bytes_sent, 14);
        assert_eq!(snap.messages_dropped, 1);
        assert_eq!(snap.bogus_messages, 1);
        assert_eq!(snap.players_joined, 1);
        assert_eq!(snap.players_rejected, 1);
        assert_eq!(snap.players, 1);
        assert_eq!(snap.ticks, 1);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = TickWindow::new(3);
        for messages in [100, 1, 2, 3] {
            window.push(TickSample {
                duration: Duration::from_millis(messages),
                messages,
                bytes: messages * 10,
            });
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.average_messages(), 2.0);
        assert_eq!(window.average_bytes(), 20.0);
        assert_eq!(window.average_duration(), Duration::from_millis(2));
    }

    #[test]
    fn test_empty_window_averages_zero() {
        let window = TickWindow::default();
        assert!(window.is_empty());
        assert_eq!(window.average_duration(), Duration::ZERO);
        assert_eq!(window.average_messages(), 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = ServerStats::new();
        let json = serde_json::to_string(&stats.snapshot(&TickWindow::default())).unwrap();
        assert!(json.contains("\"bogus_messages\":0"));
        assert!(json.contains("\"avg_tick_ms\""));
    }
}
