//! The generation store
//!
//! The store holds at most one point per series identity. It is written by a
//! single ingestion loop and read by any number of concurrent scrapes, and the
//! two must never observe each other's partial work. To that end writes are
//! not made to the visible data at all:
//!
//!   - `begin_generation` hands the writer a private, empty buffer,
//!   - `put` fills that buffer, last write per identity winning,
//!   - `commit_generation` swaps the buffer in as the visible generation with
//!     a single atomic pointer store.
//!
//! A reader loads the current generation pointer once and works from that
//! immutable generation for the rest of its call. It sees the whole of one
//! generation or the whole of the next, never a mix, and takes no lock to do
//! so. Superseded generations are freed when their last reader lets go.
//!
//! Age filtering happens on read. A point older than the reader's `max_age`
//! is left out of the snapshot without anything being written, so a series
//! whose source stops updating ages out on its own.

use arc_swap::ArcSwap;
use metric::{Identity, Point};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time;

/// An immutable, committed batch of points.
#[derive(Debug, Default)]
struct Generation {
    id: u64,
    points: BTreeMap<Identity, Point>,
}

/// A private write buffer for one generation
///
/// Obtained from `Store::begin_generation`. Nothing put into a handle is
/// visible to readers until the handle is passed to
/// `Store::commit_generation`. Committing or abandoning consumes the handle,
/// so writing to a generation after it has been committed is not expressible.
#[derive(Debug)]
pub struct GenerationHandle {
    id: u64,
    points: BTreeMap<Identity, Point>,
}

impl GenerationHandle {
    /// The id this generation will be visible under once committed.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Insert a point, replacing any earlier point with the same identity.
    pub fn put(&mut self, point: Point) {
        self.points.insert(point.identity.clone(), point);
    }

    /// Number of distinct identities in the buffer.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if nothing has been put.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The metric store. See the module documentation.
#[derive(Debug)]
pub struct Store {
    current: ArcSwap<Generation>,
    next_id: AtomicU64,
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl Store {
    /// Create an empty store. The visible generation has id 0 and no points.
    pub fn new() -> Store {
        Store {
            current: ArcSwap::from_pointee(Generation::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh, empty write buffer. Readers are unaffected.
    pub fn begin_generation(&self) -> GenerationHandle {
        GenerationHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            points: BTreeMap::new(),
        }
    }

    /// Insert a point into an uncommitted generation. Same as
    /// `GenerationHandle::put`.
    pub fn put(&self, handle: &mut GenerationHandle, point: Point) {
        handle.put(point)
    }

    /// Make `handle` the visible generation
    ///
    /// Snapshots started after this returns observe this generation or a later
    /// one. Snapshots already in flight keep the generation they loaded.
    /// Returns the id of the committed generation.
    pub fn commit_generation(&self, handle: GenerationHandle) -> u64 {
        let id = handle.id;
        let len = handle.points.len();
        let prev = self.current.swap(Arc::new(Generation {
            id: id,
            points: handle.points,
        }));
        debug!(
            "committed generation {} with {} points, replacing generation {} with {} points",
            id,
            len,
            prev.id,
            prev.points.len()
        );
        id
    }

    /// Throw away an uncommitted generation. The visible generation is
    /// unchanged.
    pub fn abandon_generation(&self, handle: GenerationHandle) {
        debug!(
            "abandoned generation {} with {} points",
            handle.id,
            handle.points.len()
        );
    }

    /// Points of the visible generation no older than `max_age`, as of now.
    pub fn snapshot(&self, max_age: Duration) -> Vec<Point> {
        self.snapshot_at(time::now(), max_age)
    }

    /// Points of the visible generation no older than `max_age` at `now`
    ///
    /// A point is included when `now - timestamp <= max_age`; a point exactly
    /// `max_age` old is still reported. Points are returned in identity
    /// order, each identity at most once.
    pub fn snapshot_at(&self, now: i64, max_age: Duration) -> Vec<Point> {
        let max_age = time::millis(max_age);
        let generation = self.current.load_full();
        generation
            .points
            .values()
            .filter(|p| p.age(now) <= max_age)
            .cloned()
            .collect()
    }

    /// Id of the visible generation.
    pub fn generation(&self) -> u64 {
        self.current.load().id
    }

    /// Number of points in the visible generation, regardless of age.
    pub fn len(&self) -> usize {
        self.current.load().points.len()
    }

    /// True if the visible generation holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use metric::{LabelSet, MetricKind};
    use quickcheck::{QuickCheck, TestResult};
    use std::sync::atomic::AtomicBool;
    use std::thread;

    const HOUR: u64 = 3_600;

    fn gauge(name: &str, value: f64, ts: i64) -> Point {
        Point::new(name, LabelSet::new(), MetricKind::Gauge, value, ts)
    }

    fn values(points: &[Point]) -> Vec<(String, f64)> {
        points
            .iter()
            .map(|p| (p.name().to_string(), p.value))
            .collect()
    }

    #[test]
    fn test_empty_store_snapshot() {
        let store = Store::new();
        assert!(store.snapshot(Duration::from_secs(HOUR)).is_empty());
        assert_eq!(store.generation(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_uncommitted_is_invisible() {
        let store = Store::new();
        let mut gen = store.begin_generation();
        store.put(&mut gen, gauge("x", 1.0, 1_000));
        assert!(store.snapshot_at(1_000, Duration::from_secs(HOUR)).is_empty());
        store.commit_generation(gen);
        assert_eq!(store.snapshot_at(1_000, Duration::from_secs(HOUR)).len(), 1);
    }

    #[test]
    fn test_identity_dedup_last_write_wins() {
        let store = Store::new();
        let mut gen = store.begin_generation();
        gen.put(gauge("x", 1.0, 1_000));
        gen.put(gauge("x", 2.0, 1_000));
        let mut labels = LabelSet::new();
        labels.insert("a", "b");
        gen.put(Point::new("x", labels, MetricKind::Gauge, 3.0, 1_000));
        assert_eq!(gen.len(), 2);
        store.commit_generation(gen);

        let snap = store.snapshot_at(1_000, Duration::from_secs(HOUR));
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].value, 2.0);
        assert!(snap[0].labels().is_empty());
        assert_eq!(snap[1].value, 3.0);
    }

    #[test]
    fn test_dedup_property() {
        fn inner(writes: Vec<(u8, u8, i32)>) -> TestResult {
            let store = Store::new();
            let mut gen = store.begin_generation();
            let mut expected: BTreeMap<(String, String), f64> = BTreeMap::new();
            for (n, l, v) in writes {
                let name = format!("m{}", n % 4);
                let label = format!("{}", l % 3);
                let mut labels = LabelSet::new();
                labels.insert("l", label.clone());
                gen.put(Point::new(
                    name.clone(),
                    labels,
                    MetricKind::Untyped,
                    f64::from(v),
                    1,
                ));
                expected.insert((name, label), f64::from(v));
            }
            store.commit_generation(gen);
            let snap = store.snapshot_at(1, Duration::from_secs(1));
            assert_eq!(snap.len(), expected.len());
            for p in &snap {
                let key = (p.name().to_string(), p.labels().get("l").unwrap().to_string());
                assert_eq!(expected[&key], p.value);
            }
            TestResult::passed()
        }
        QuickCheck::new().quickcheck(inner as fn(Vec<(u8, u8, i32)>) -> TestResult);
    }

    #[test]
    fn test_age_eviction_boundary() {
        let store = Store::new();
        let max_age = Duration::from_secs(60);
        let t = 1_000_000;
        let mut gen = store.begin_generation();
        gen.put(gauge("x", 1.0, t));
        store.commit_generation(gen);

        let max_age_ms = 60_000;
        assert_eq!(store.snapshot_at(t + max_age_ms - 1, max_age).len(), 1);
        // Exactly max_age old is still visible.
        assert_eq!(store.snapshot_at(t + max_age_ms, max_age).len(), 1);
        assert!(store.snapshot_at(t + max_age_ms + 1, max_age).is_empty());
        // Aging out is a read-time decision; the point is still stored.
        assert_eq!(store.len(), 1);
        // Future timestamps are visible.
        assert_eq!(store.snapshot_at(t - 10_000, max_age).len(), 1);
    }

    #[test]
    fn test_full_replacement() {
        let store = Store::new();
        let mut gen = store.begin_generation();
        gen.put(gauge("x", 1.0, 10));
        gen.put(gauge("gone", 1.0, 10));
        store.commit_generation(gen);

        let mut gen = store.begin_generation();
        gen.put(gauge("x", 2.0, 10));
        store.commit_generation(gen);

        let snap = store.snapshot_at(10, Duration::from_secs(HOUR));
        assert_eq!(values(&snap), vec![("x".to_string(), 2.0)]);
    }

    #[test]
    fn test_abandon_keeps_previous_generation() {
        let store = Store::new();
        let mut gen = store.begin_generation();
        gen.put(gauge("x", 1.0, 10));
        let committed = store.commit_generation(gen);

        let mut gen = store.begin_generation();
        gen.put(gauge("x", 99.0, 10));
        store.abandon_generation(gen);

        assert_eq!(store.generation(), committed);
        let snap = store.snapshot_at(10, Duration::from_secs(HOUR));
        assert_eq!(values(&snap), vec![("x".to_string(), 1.0)]);
    }

    #[test]
    fn test_generation_ids_increase() {
        let store = Store::new();
        let a = store.commit_generation(store.begin_generation());
        let b = store.commit_generation(store.begin_generation());
        assert!(a > 0);
        assert!(b > a);
        assert_eq!(store.generation(), b);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_commits() {
        let store = Store::new();
        let mut gen = store.begin_generation();
        gen.put(gauge("x", 1.0, 10));
        store.commit_generation(gen);
        let before = store.snapshot_at(10, Duration::from_secs(HOUR));

        let mut gen = store.begin_generation();
        gen.put(gauge("y", 2.0, 10));
        store.commit_generation(gen);

        assert_eq!(values(&before), vec![("x".to_string(), 1.0)]);
    }

    // Every generation written here holds the same identities, all carrying
    // the generation number as their value. A reader that ever sees two
    // different values in one snapshot has observed a torn generation.
    #[test]
    fn test_atomic_visibility_under_concurrency() {
        let store = Arc::new(Store::new());
        let done = Arc::new(AtomicBool::new(false));
        let series = 64;

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            readers.push(thread::spawn(move || {
                let mut last_seen = 0.0;
                let mut observed = 0;
                while !done.load(Ordering::SeqCst) {
                    let snap = store.snapshot_at(1, Duration::from_secs(HOUR));
                    if snap.is_empty() {
                        continue;
                    }
                    assert_eq!(snap.len(), series);
                    let first = snap[0].value;
                    for p in &snap {
                        assert_eq!(p.value, first);
                    }
                    // Visibility is monotonic.
                    assert!(first >= last_seen);
                    last_seen = first;
                    observed += 1;
                }
                observed
            }));
        }

        for n in 1..500u32 {
            let mut gen = store.begin_generation();
            for s in 0..series {
                gen.put(gauge(&format!("series_{}", s), f64::from(n), 1));
            }
            store.commit_generation(gen);
        }
        done.store(true, Ordering::SeqCst);

        for reader in readers {
            reader.join().expect("reader panicked");
        }
        let snap = store.snapshot_at(1, Duration::from_secs(HOUR));
        assert!(snap.iter().all(|p| p.value == 499.0));
    }
}
