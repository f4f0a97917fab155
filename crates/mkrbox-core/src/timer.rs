//! Timer registry driven by a virtual millisecond clock.
//!
//! Every deferred transition the engine schedules lives here, so a single
//! [`TimerRegistry::cancel_all`] leaves nothing pending. Timers carry plain
//! data actions instead of closures; the owner pops due entries with
//! [`TimerRegistry::pop_due`] and interprets them with full `&mut` access.
//!
//! # Ordering
//!
//! Entries fire in deadline order. Entries sharing a deadline fire in
//! registration order. A re-armed interval counts as a fresh registration.

use std::collections::BTreeMap;

/// Milliseconds on the virtual clock.
pub type Millis = u64;

/// Handle for a one-shot timer, usable with [`TimerRegistry::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Interval<A> {
    action: A,
    period: Millis,
    next_due: Millis,
    seq: u64,
}

/// Where a fired action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiredFrom {
    /// A one-shot timer, already removed from the registry.
    OneShot(TimerId),
    /// A named interval, already re-armed for its next period.
    Interval(&'static str),
}

/// A due timer handed back to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<A> {
    /// Virtual time at which the timer fired.
    pub at: Millis,
    pub source: FiredFrom,
    pub action: A,
}

// ---------------------------------------------------------------------------
// TimerRegistry
// ---------------------------------------------------------------------------

/// Bookkeeping for one-shot and named repeating timers.
#[derive(Debug, Clone)]
pub struct TimerRegistry<A> {
    now: Millis,
    next_seq: u64,
    /// Keyed by (deadline, registration sequence).
    one_shots: BTreeMap<(Millis, u64), A>,
    intervals: BTreeMap<&'static str, Interval<A>>,
}

impl<A> Default for TimerRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TimerRegistry<A> {
    /// Create an empty registry with the clock at zero.
    pub fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            one_shots: BTreeMap::new(),
            intervals: BTreeMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Millis {
        self.now
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Register a one-shot action to fire `delay` ms from now.
    pub fn schedule(&mut self, action: A, delay: Millis) -> TimerId {
        let seq = self.bump_seq();
        self.one_shots
            .insert((self.now.saturating_add(delay), seq), action);
        TimerId(seq)
    }

    /// Cancel a single one-shot. Returns `false` if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.one_shots.keys().find(|(_, seq)| *seq == id.0).copied();
        match key {
            Some(key) => self.one_shots.remove(&key).is_some(),
            None => false,
        }
    }

    /// Start a named interval. No-op (returns `false`) if one with the same
    /// name is already running. A zero period is clamped to 1ms.
    pub fn start_interval(&mut self, name: &'static str, action: A, period: Millis) -> bool {
        if self.intervals.contains_key(name) {
            return false;
        }
        let period = period.max(1);
        let seq = self.bump_seq();
        self.intervals.insert(
            name,
            Interval {
                action,
                period,
                next_due: self.now.saturating_add(period),
                seq,
            },
        );
        true
    }

    /// Stop a named interval. Returns `false` if it was not running.
    pub fn stop_interval(&mut self, name: &str) -> bool {
        self.intervals.remove(name).is_some()
    }

    /// Whether the named interval is running.
    pub fn is_interval_running(&self, name: &str) -> bool {
        self.intervals.contains_key(name)
    }

    /// Drop every one-shot and every interval. Safe with nothing pending.
    pub fn cancel_all(&mut self) {
        self.one_shots.clear();
        self.intervals.clear();
    }

    /// Number of outstanding one-shots plus running intervals.
    pub fn pending_count(&self) -> usize {
        self.one_shots.len() + self.intervals.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    /// Earliest deadline among all pending entries.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.next_key().map(|(due, _)| due)
    }

    fn next_key(&self) -> Option<(Millis, u64)> {
        let one_shot = self.one_shots.keys().next().copied();
        let interval = self.intervals.values().map(|i| (i.next_due, i.seq)).min();
        match (one_shot, interval) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Move the clock forward without firing anything. Never moves it back.
    pub fn advance_clock(&mut self, to: Millis) {
        self.now = self.now.max(to);
    }
}

impl<A: Clone> TimerRegistry<A> {
    /// Take the next entry due at or before `until`, moving the clock to its
    /// deadline. One-shots are removed before they are returned; intervals
    /// are re-armed for their next period.
    pub fn pop_due(&mut self, until: Millis) -> Option<Fired<A>> {
        let (due, seq) = self.next_key()?;
        if due > until {
            return None;
        }
        self.now = self.now.max(due);

        if let Some(action) = self.one_shots.remove(&(due, seq)) {
            return Some(Fired {
                at: due,
                source: FiredFrom::OneShot(TimerId(seq)),
                action,
            });
        }

        let name = self
            .intervals
            .iter()
            .find(|(_, i)| i.next_due == due && i.seq == seq)
            .map(|(name, _)| *name)?;
        let rearm_seq = self.bump_seq();
        let interval = self.intervals.get_mut(name)?;
        interval.next_due = due.saturating_add(interval.period);
        interval.seq = rearm_seq;
        Some(Fired {
            at: due,
            source: FiredFrom::Interval(name),
            action: interval.action.clone(),
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
