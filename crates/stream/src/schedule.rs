use std::time::Duration;

/// Trailing-edge debouncer for tile regeneration with at most one culling
/// request in flight.
///
/// Callers `request` as often as they like; `poll` hands out a sequence
/// number once the debounce window has been quiet. A request that comes due
/// while another is in flight is deferred until that one completes.
#[derive(Debug, Clone)]
pub struct RegenScheduler {
    debounce: Duration,
    due: Option<Duration>,
    in_flight: Option<u64>,
    deferred: bool,
    next_seq: u64,
    last_applied: Option<u64>,
}

impl RegenScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            due: None,
            in_flight: None,
            deferred: false,
            next_seq: 0,
            last_applied: None,
        }
    }

    /// Ask for a regeneration; pushes the deadline back to `now + debounce`.
    pub fn request(&mut self, now: Duration) {
        self.due = Some(now + self.debounce);
    }

    /// Returns the sequence number to submit, if a request is due and nothing is in flight.
    pub fn poll(&mut self, now: Duration) -> Option<u64> {
        let due = self.due?;
        if now < due {
            return None;
        }
        self.due = None;
        if self.in_flight.is_some() {
            self.deferred = true;
            return None;
        }
        self.next_seq += 1;
        self.in_flight = Some(self.next_seq);
        Some(self.next_seq)
    }

    /// Record an answer. Returns false for answers older than the last applied one.
    pub fn complete(&mut self, seq: u64, now: Duration) -> bool {
        if self.in_flight == Some(seq) {
            self.in_flight = None;
            if std::mem::take(&mut self.deferred) {
                self.due = Some(now);
            }
        }
        if self.last_applied.is_some_and(|last| seq < last) {
            tracing::debug!(seq, "ignoring stale culling response");
            return false;
        }
        self.last_applied = Some(seq);
        true
    }

    /// Forget the in-flight request, e.g. after the culling backend failed.
    pub fn abandon(&mut self) {
        self.in_flight = None;
        self.deferred = false;
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some() || self.deferred
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }
}
