#[macro_use]
extern crate criterion;
extern crate flate2;
extern crate prometheus;

use criterion::Criterion;

extern crate textfile_exporter;

use flate2::Compression;
use flate2::write::GzEncoder;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use textfile_exporter::exposition::TimeAwareCollector;
use textfile_exporter::exposition::text::write_text;
use textfile_exporter::metric::{LabelSet, MetricKind, Point};
use textfile_exporter::protocols::prometheus::text::parse;
use textfile_exporter::store::Store;
use textfile_exporter::time;

fn setup() -> Registry {
    let store = Arc::new(Store::new());
    let now = time::now();
    let mut gen = store.begin_generation();
    for i in 0..1_000u32 {
        let mut labels = LabelSet::new();
        labels.insert("instance", format!("host-{}", i % 50));
        labels.insert("job", "batch");
        gen.put(
            Point::new(
                format!("job_metric_{}", i / 50),
                labels,
                MetricKind::Gauge,
                f64::from(i),
                now,
            ).help("A batch job gauge."),
        );
    }
    store.commit_generation(gen);
    let registry = Registry::new();
    registry
        .register(Box::new(TimeAwareCollector::new(store, Duration::from_secs(3600))))
        .unwrap();
    registry
}

fn experiment(registry: &Registry) {
    let buffer = Vec::with_capacity(64 * 1024);
    write_text(&registry.gather(), buffer).unwrap();
}

fn experiment_gzip(registry: &Registry) {
    let buffer = Vec::with_capacity(16 * 1024);
    let enc = GzEncoder::new(buffer, Compression::fast());
    write_text(&registry.gather(), enc).unwrap().finish().unwrap();
}

fn benchmark(c: &mut Criterion) {
    let registry = setup();
    c.bench_function("exposition_write_text", move |b| {
        b.iter(|| experiment(&registry));
    });
}

fn benchmark_gzip(c: &mut Criterion) {
    let registry = setup();
    c.bench_function("exposition_write_text_gzip", move |b| {
        b.iter(|| experiment_gzip(&registry));
    });
}

fn benchmark_parse(c: &mut Criterion) {
    let rendered = String::from_utf8(write_text(&setup().gather(), Vec::new()).unwrap()).unwrap();
    c.bench_function("protocols_prometheus_parse", move |b| {
        b.iter(|| parse(&rendered).unwrap());
    });
}

criterion_group!(benches, benchmark, benchmark_gzip, benchmark_parse);
criterion_main!(benches);
