//! Per-Tick Pending Events
//!
//! Scratch state collected between two ticks: who joined, who left and
//! which latency probes arrived. Join/leave collapsing happens here,
//! incrementally, at the moment a leave is recorded: a player that both
//! joined and left inside one tick window simply disappears from the
//! joined set and never reaches the left set.

use std::collections::{BTreeMap, BTreeSet};

use crate::game::state::PlayerId;

/// What recording a leave did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The player joined during this same window; both events vanished.
    Collapsed,
    /// The player was known before this window; a leave will be broadcast.
    Recorded,
}

/// Scratch collections for one tick window.
///
/// Invariant: `joined` and `left` are always disjoint.
#[derive(Clone, Debug, Default)]
pub struct PendingEvents {
    joined: BTreeSet<PlayerId>,
    left: BTreeSet<PlayerId>,
    pings: BTreeMap<PlayerId, f64>,
}

impl PendingEvents {
    /// Create empty scratch state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a player joined.
    pub fn record_join(&mut self, id: PlayerId) {
        // Ids are never reused, so a fresh join cannot already be in `left`.
        debug_assert!(!self.left.contains(&id));
        self.joined.insert(id);
    }

    /// Record that a player left, collapsing with a same-window join.
    pub fn record_leave(&mut self, id: PlayerId) -> LeaveOutcome {
        if self.joined.remove(&id) {
            self.pings.remove(&id);
            LeaveOutcome::Collapsed
        } else {
            self.left.insert(id);
            LeaveOutcome::Recorded
        }
    }

    /// Record a latency probe. Only the latest probe per player survives.
    pub fn record_ping(&mut self, id: PlayerId, timestamp: f64) {
        self.pings.insert(id, timestamp);
    }

    /// Players that joined in this window, in id order.
    pub fn joined(&self) -> &BTreeSet<PlayerId> {
        &self.joined
    }

    /// Players that left in this window, in id order.
    pub fn left(&self) -> &BTreeSet<PlayerId> {
        &self.left
    }

    /// Latest probe timestamp per player.
    pub fn pings(&self) -> &BTreeMap<PlayerId, f64> {
        &self.pings
    }

    /// Check if nothing happened in this window.
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty() && self.pings.is_empty()
    }

    /// Take the current window, leaving fresh empty scratch behind.
    pub fn take(&mut self) -> PendingEvents {
        std::mem::take(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================
