use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A server-side record that can be materialized into a render object.
pub trait EntityRecord {
    type Id: Ord + Clone + fmt::Debug + fmt::Display;

    fn id(&self) -> &Self::Id;

    /// Records that fail this check are skipped without touching any
    /// existing object for the same id.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Entity-specific half of the diff engine: how records become objects.
pub trait Materializer<R: EntityRecord> {
    type Object;

    /// Build (pool-first) an object for a new id. `None` skips the record.
    fn create(&mut self, record: &R) -> Option<Self::Object>;

    /// Change-detection predicate over display-relevant fields.
    fn changed(&self, old: &R, new: &R) -> bool;

    fn update(&mut self, object: &mut Self::Object, old: &R, new: &R);

    /// Runs once per snapshot for every present entity, changed or not.
    fn refresh(&mut self, _object: &mut Self::Object, _record: &R) {}

    /// Detach listeners, destroy nested overlays and return the object to its pool.
    fn recycle(&mut self, object: Self::Object, record: &R);
}

/// Whether ids missing from a snapshot should be recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMode {
    Full,
    /// Upsert only; absent ids are left alone.
    Partial,
}

/// What one `apply_snapshot` call did, per id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport<Id> {
    pub created: Vec<Id>,
    pub updated: Vec<Id>,
    pub unchanged: Vec<Id>,
    pub recycled: Vec<Id>,
    pub skipped: Vec<Id>,
}

impl<Id> Default for DiffReport<Id> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            unchanged: Vec::new(),
            recycled: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<Id> DiffReport<Id> {
    /// True when the snapshot changed nothing on screen.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.recycled.is_empty()
    }
}

struct Entry<R, O> {
    record: R,
    object: O,
}

/// Owns the mapping entity id -> materialized object.
///
/// Nothing else creates or destroys these objects; every change goes through
/// [`DiffEngine::apply_snapshot`], [`DiffEngine::remove`] or [`DiffEngine::clear_all`].
pub struct DiffEngine<R: EntityRecord, O> {
    label: &'static str,
    entries: BTreeMap<R::Id, Entry<R, O>>,
    snapshots: u64,
}

impl<R: EntityRecord, O> DiffEngine<R, O> {
    /// `label` only names the engine in logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: BTreeMap::new(),
            snapshots: 0,
        }
    }

    /// Diff `records` against the materialized set and reconcile.
    ///
    /// Recycling runs before creation so a snapshot that swaps one id for
    /// another reuses the freed object. Duplicate ids: the last record wins.
    pub fn apply_snapshot<M>(
        &mut self,
        records: impl IntoIterator<Item = R>,
        mode: SnapshotMode,
        materializer: &mut M,
    ) -> DiffReport<R::Id>
    where
        M: Materializer<R, Object = O>,
    {
        let _span = tracing::info_span!("apply_snapshot", engine = self.label, ?mode).entered();
        let mut report = DiffReport::default();

        let mut incoming: BTreeMap<R::Id, R> = BTreeMap::new();
        let mut skipped: BTreeSet<R::Id> = BTreeSet::new();
        for record in records {
            let id = record.id().clone();
            if record.is_valid() {
                skipped.remove(&id);
                incoming.insert(id, record);
            } else {
                tracing::warn!(engine = self.label, %id, "skipping invalid record");
                incoming.remove(&id);
                skipped.insert(id);
            }
        }

        if mode == SnapshotMode::Full {
            let absent: Vec<R::Id> = self
                .entries
                .keys()
                .filter(|id| !incoming.contains_key(*id) && !skipped.contains(*id))
                .cloned()
                .collect();
            for id in absent {
                if let Some(entry) = self.entries.remove(&id) {
                    tracing::debug!(engine = self.label, %id, "recycle");
                    materializer.recycle(entry.object, &entry.record);
                    report.recycled.push(id);
                }
            }
        }

        for (id, record) in incoming {
            match self.entries.get_mut(&id) {
                Some(entry) => {
                    if materializer.changed(&entry.record, &record) {
                        materializer.update(&mut entry.object, &entry.record, &record);
                        report.updated.push(id);
                    } else {
                        report.unchanged.push(id);
                    }
                    entry.record = record;
                }
                None => match materializer.create(&record) {
                    Some(object) => {
                        tracing::debug!(engine = self.label, %id, "create");
                        self.entries.insert(id.clone(), Entry { record, object });
                        report.created.push(id);
                    }
                    None => {
                        tracing::warn!(engine = self.label, %id, "materializer declined record");
                        skipped.insert(id);
                    }
                },
            }
        }

        for entry in self.entries.values_mut() {
            if !skipped.contains(entry.record.id()) {
                materializer.refresh(&mut entry.object, &entry.record);
            }
        }

        report.skipped = skipped.into_iter().collect();
        self.snapshots += 1;
        tracing::trace!(
            engine = self.label,
            created = report.created.len(),
            updated = report.updated.len(),
            recycled = report.recycled.len(),
            skipped = report.skipped.len(),
            "snapshot applied"
        );
        report
    }

    /// Recycle one entity. Returns false if it was not materialized.
    pub fn remove<M>(&mut self, id: &R::Id, materializer: &mut M) -> bool
    where
        M: Materializer<R, Object = O>,
    {
        match self.entries.remove(id) {
            Some(entry) => {
                materializer.recycle(entry.object, &entry.record);
                true
            }
            None => false,
        }
    }

    /// Recycle every materialized entity.
    pub fn clear_all<M>(&mut self, materializer: &mut M) -> usize
    where
        M: Materializer<R, Object = O>,
    {
        let entries = std::mem::take(&mut self.entries);
        let n = entries.len();
        for (_, entry) in entries {
            materializer.recycle(entry.object, &entry.record);
        }
        n
    }

    pub fn get(&self, id: &R::Id) -> Option<&O> {
        self.entries.get(id).map(|e| &e.object)
    }

    pub fn get_mut(&mut self, id: &R::Id) -> Option<&mut O> {
        self.entries.get_mut(id).map(|e| &mut e.object)
    }

    /// The record the object for `id` was last reconciled against.
    pub fn record(&self, id: &R::Id) -> Option<&R> {
        self.entries.get(id).map(|e| &e.record)
    }

    pub fn contains(&self, id: &R::Id) -> bool {
        self.entries.contains_key(id)
    }

    /// Materialized entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&R::Id, &R, &O)> {
        self.entries.iter().map(|(id, e)| (id, &e.record, &e.object))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&R::Id, &R, &mut O)> {
        self.entries
            .iter_mut()
            .map(|(id, e)| (id, &e.record, &mut e.object))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshots applied so far.
    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Rec {
        id: u32,
        value: i32,
        noise: i32,
        valid: bool,
    }

    fn rec(id: u32, value: i32) -> Rec {
        Rec {
            id,
            value,
            noise: 0,
            valid: true,
        }
    }

    impl EntityRecord for Rec {
        type Id = u32;
        fn id(&self) -> &u32 {
            &self.id
        }
        fn is_valid(&self) -> bool {
            self.valid
        }
    }

    /// Objects are plain handles drawn from a free list.
    #[derive(Default)]
    struct Handles {
        free: Vec<u64>,
        next: u64,
        fresh: usize,
        refreshed: Vec<u32>,
    }

    impl Materializer<Rec> for Handles {
        type Object = u64;

        fn create(&mut self, _record: &Rec) -> Option<u64> {
            Some(self.free.pop().unwrap_or_else(|| {
                self.fresh += 1;
                self.next += 1;
                self.next
            }))
        }

        fn changed(&self, old: &Rec, new: &Rec) -> bool {
            old.value != new.value
        }

        fn update(&mut self, _object: &mut u64, _old: &Rec, _new: &Rec) {}

        fn refresh(&mut self, _object: &mut u64, record: &Rec) {
            self.refreshed.push(record.id);
        }

        fn recycle(&mut self, object: u64, _record: &Rec) {
            self.free.push(object);
        }
    }

    #[test]
    fn swap_one_id_reuses_its_object() {
        let mut engine = DiffEngine::new("test");
        let mut m = Handles::default();
        engine.apply_snapshot([rec(1, 0), rec(2, 0), rec(3, 0)], SnapshotMode::Full, &mut m);
        let freed = *engine.get(&1).unwrap();

        let report = engine.apply_snapshot(
            [rec(2, 0), rec(3, 5), rec(4, 0)],
            SnapshotMode::Full,
            &mut m,
        );
        assert_eq!(report.created, vec![4]);
        assert_eq!(report.recycled, vec![1]);
        assert_eq!(report.updated, vec![3]);
        assert_eq!(report.unchanged, vec![2]);
        assert_eq!(*engine.get(&4).unwrap(), freed);
        assert_eq!(m.fresh, 3);
    }

    #[test]
    fn non_compared_fields_do_not_trigger_update() {
        let mut engine = DiffEngine::new("test");
        let mut m = Handles::default();
        engine.apply_snapshot([rec(1, 0)], SnapshotMode::Full, &mut m);
        let mut noisy = rec(1, 0);
        noisy.noise = 99;
        let report = engine.apply_snapshot([noisy], SnapshotMode::Full, &mut m);
        assert!(report.is_noop());
        assert_eq!(engine.record(&1).unwrap().noise, 99);
    }

    #[test]
    fn partial_snapshot_keeps_absent_ids() {
        let mut engine = DiffEngine::new("test");
        let mut m = Handles::default();
        engine.apply_snapshot([rec(1, 0), rec(2, 0)], SnapshotMode::Full, &mut m);
        let report = engine.apply_snapshot([rec(3, 0)], SnapshotMode::Partial, &mut m);
        assert!(report.recycled.is_empty());
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn invalid_record_keeps_existing_object() {
        let mut engine = DiffEngine::new("test");
        let mut m = Handles::default();
        engine.apply_snapshot([rec(1, 0), rec(2, 0)], SnapshotMode::Full, &mut m);
        let mut broken = rec(1, 7);
        broken.valid = false;
        let report = engine.apply_snapshot([broken, rec(2, 0)], SnapshotMode::Full, &mut m);
        assert_eq!(report.skipped, vec![1]);
        assert!(report.recycled.is_empty());
        assert_eq!(engine.record(&1).unwrap().value, 0);
    }

    #[test]
    fn duplicate_ids_last_wins() {
        let mut engine = DiffEngine::new("test");
        let mut m = Handles::default();
        let report = engine.apply_snapshot([rec(1, 1), rec(1, 2)], SnapshotMode::Full, &mut m);
        assert_eq!(report.created, vec![1]);
        assert_eq!(engine.record(&1).unwrap().value, 2);
    }

    #[test]
    fn refresh_runs_for_every_present_entity() {
        let mut engine = DiffEngine::new("test");
        let mut m = Handles::default();
        engine.apply_snapshot([rec(1, 0), rec(2, 0)], SnapshotMode::Full, &mut m);
        m.refreshed.clear();
        engine.apply_snapshot([rec(2, 0)], SnapshotMode::Partial, &mut m);
        assert_eq!(m.refreshed, vec![1, 2]);
    }

    #[test]
    fn clear_all_returns_everything_to_the_pool() {
        let mut engine = DiffEngine::new("test");
        let mut m = Handles::default();
        engine.apply_snapshot([rec(1, 0), rec(2, 0)], SnapshotMode::Full, &mut m);
        assert_eq!(engine.clear_all(&mut m), 2);
        assert!(engine.is_empty());
        assert_eq!(m.free.len(), 2);
        assert!(!engine.remove(&1, &mut m));
    }
}
