use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use crate::stage::{Stage, VisualId};

/// Pool counters, reported by the scene inspector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub released: u64,
    /// Releases refused because the visual was already pooled.
    pub rejected: u64,
}

/// Free lists of parked visuals keyed by role.
///
/// Parked visuals stay on the stage, hidden and inactive, so reuse costs a
/// reset instead of a rebuild. Unbounded, reuse-first.
pub struct VisualPool<R> {
    free: BTreeMap<R, Vec<VisualId>>,
    parked: BTreeSet<VisualId>,
    stats: PoolStats,
}

impl<R> Default for VisualPool<R> {
    fn default() -> Self {
        Self {
            free: BTreeMap::new(),
            parked: BTreeSet::new(),
            stats: PoolStats::default(),
        }
    }
}

impl<R: Ord + Copy + Debug> VisualPool<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a parked visual for `role`, reset to defaults, or build a fresh one.
    pub fn acquire<A: Clone>(
        &mut self,
        role: R,
        stage: &mut Stage<A>,
        build: impl FnOnce(&mut Stage<A>) -> VisualId,
    ) -> VisualId {
        while let Some(id) = self.free.get_mut(&role).and_then(Vec::pop) {
            self.parked.remove(&id);
            if stage.contains(id) {
                stage.reset_tree(id);
                self.stats.reused += 1;
                return id;
            }
            tracing::debug!(?role, %id, "dropping pooled visual destroyed elsewhere");
        }
        self.stats.created += 1;
        build(stage)
    }

    /// Park `id` under `role`. Listeners are detached immediately.
    pub fn release<A: Clone>(&mut self, role: R, id: VisualId, stage: &mut Stage<A>) -> bool {
        if self.parked.contains(&id) {
            self.stats.rejected += 1;
            tracing::warn!(?role, %id, "visual released twice");
            return false;
        }
        if !stage.contains(id) {
            return false;
        }
        stage.clear_listeners(id);
        stage.update(id, |v| {
            v.visible = false;
            v.active = false;
        });
        self.parked.insert(id);
        self.free.entry(role).or_default().push(id);
        self.stats.released += 1;
        true
    }

    pub fn is_parked(&self, id: VisualId) -> bool {
        self.parked.contains(&id)
    }

    pub fn available(&self, role: R) -> usize {
        self.free.get(&role).map(Vec::len).unwrap_or(0)
    }

    pub fn total_available(&self) -> usize {
        self.parked.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Destroy every parked visual.
    pub fn drain<A: Clone>(&mut self, stage: &mut Stage<A>) -> usize {
        let mut n = 0;
        for id in std::mem::take(&mut self.parked) {
            n += stage.destroy(id).min(1);
        }
        self.free.clear();
        n
    }
}
