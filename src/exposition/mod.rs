//! Prometheus is a pull-based aggregation server
//!
//! This module answers its scrapes. Collectors are registered with a
//! `prometheus::Registry`, which asks them for descriptors once, at
//! registration, and gathers what they currently have on every scrape. The
//! gathered families are rendered by `text` and served by `ScrapeHandler`.
//!
//! `TimeAwareCollector` reports whatever in the store is young enough.
//! `SelfCollector` reports textfile-exporter's own counters.

use metric::{MetricKind, Point};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};
use prometheus::{self, Registry};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use store::Store;

mod handler;
mod telemetry;
pub mod text;

pub use self::handler::ScrapeHandler;
pub use self::telemetry::SelfCollector;

lazy_static! {
    /// Total collected points dropped for disagreeing with their family
    pub static ref EXPOSITION_INCONSISTENT_DROPPED: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    /// Total scrapes answered
    pub static ref EXPOSITION_REPORT_SUCCESS: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    /// Total scrapes that could not be answered
    pub static ref EXPOSITION_REPORT_ERROR: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    /// Sum of time spent rendering scrapes (microseconds)
    pub static ref EXPOSITION_RESPONSE_DELAY_SUM: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
}

/// Build the registry a scrape is answered from: the store's points no
/// older than `max_age`, and the exporter's own counters.
pub fn registry(store: Arc<Store>, max_age: Duration) -> prometheus::Result<Registry> {
    let registry = Registry::new();
    registry.register(Box::new(TimeAwareCollector::new(store, max_age)))?;
    registry.register(Box::new(SelfCollector::new()?))?;
    Ok(registry)
}

/// Reports the store's points that are no older than `max_age`
///
/// Metric names are whatever the ingested files contain, so nothing can be
/// described ahead of time and the collector registers unchecked.
pub struct TimeAwareCollector {
    store: Arc<Store>,
    max_age: Duration,
}

impl TimeAwareCollector {
    /// Create a collector over `store`.
    pub fn new(store: Arc<Store>, max_age: Duration) -> TimeAwareCollector {
        TimeAwareCollector {
            store: store,
            max_age: max_age,
        }
    }
}

impl Collector for TimeAwareCollector {
    fn desc(&self) -> Vec<&Desc> {
        Vec::new()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        // The snapshot is our own copy; no store state is held while
        // translating.
        families(self.store.snapshot(self.max_age))
    }
}

/// Group `points` into families ordered by name
///
/// The first point seen under a name fixes that family's kind and help. A
/// later point of the same name but a different kind is dropped.
fn families(points: Vec<Point>) -> Vec<MetricFamily> {
    let mut families: BTreeMap<String, (MetricKind, MetricFamily)> = BTreeMap::new();
    for point in points {
        let kind = point.kind;
        match families.entry(point.identity.name.clone()) {
            Entry::Vacant(e) => {
                let mut family = MetricFamily::default();
                family.set_name(e.key().clone());
                family.set_help(point.help.clone());
                family.set_field_type(metric_type(kind));
                family.mut_metric().push(to_metric(point));
                e.insert((kind, family));
            }
            Entry::Occupied(mut e) => {
                if e.get().0 != kind {
                    warn!(
                        "metric {} collected as {} but family is {}, dropping",
                        e.key(),
                        kind,
                        e.get().0
                    );
                    EXPOSITION_INCONSISTENT_DROPPED.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                e.get_mut().1.mut_metric().push(to_metric(point));
            }
        }
    }
    families.into_iter().map(|(_, (_, family))| family).collect()
}

fn metric_type(kind: MetricKind) -> MetricType {
    match kind {
        MetricKind::Gauge => MetricType::GAUGE,
        MetricKind::Counter => MetricType::COUNTER,
        MetricKind::Untyped => MetricType::UNTYPED,
    }
}

fn to_metric(point: Point) -> proto::Metric {
    let mut metric = proto::Metric::default();
    for &(ref name, ref value) in point.identity.labels.iter() {
        let mut pair = proto::LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        metric.mut_label().push(pair);
    }
    match point.kind {
        MetricKind::Gauge => {
            let mut gauge = proto::Gauge::default();
            gauge.set_value(point.value);
            metric.set_gauge(gauge);
        }
        MetricKind::Counter => {
            let mut counter = proto::Counter::default();
            counter.set_value(point.value);
            metric.set_counter(counter);
        }
        MetricKind::Untyped => {
            let mut untyped = proto::Untyped::default();
            untyped.set_value(point.value);
            metric.set_untyped(untyped);
        }
    }
    metric.set_timestamp_ms(point.timestamp);
    metric
}
