use exposition::{EXPOSITION_INCONSISTENT_DROPPED, EXPOSITION_REPORT_ERROR,
                 EXPOSITION_REPORT_SUCCESS, EXPOSITION_RESPONSE_DELAY_SUM};
use prometheus;
use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};
use source::{SOURCE_DECODE_ERRORS, SOURCE_FILES_INGESTED, SOURCE_STALE_FILES,
             SOURCE_UNSUPPORTED_DROPPED};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Counter {
    desc: Desc,
    value: Arc<AtomicUsize>,
}

/// Exposes textfile-exporter's process-wide counters as prometheus counters
///
/// The counters themselves stay plain atomics, bumped wherever the work
/// happens; this collector only reads them at scrape time.
pub struct SelfCollector {
    counters: Vec<Counter>,
}

impl SelfCollector {
    /// Describe every process-wide counter.
    pub fn new() -> prometheus::Result<SelfCollector> {
        let known = vec![
            (
                "textfile_exporter_files_ingested_total",
                "Files decoded successfully.",
                Arc::clone(&SOURCE_FILES_INGESTED),
            ),
            (
                "textfile_exporter_decode_errors_total",
                "Files skipped for failing to open or decode.",
                Arc::clone(&SOURCE_DECODE_ERRORS),
            ),
            (
                "textfile_exporter_stale_files_total",
                "Stale files handed to the old files command.",
                Arc::clone(&SOURCE_STALE_FILES),
            ),
            (
                "textfile_exporter_unsupported_dropped_total",
                "Summary and histogram samples dropped.",
                Arc::clone(&SOURCE_UNSUPPORTED_DROPPED),
            ),
            (
                "textfile_exporter_inconsistent_dropped_total",
                "Points dropped for disagreeing with their family's type.",
                Arc::clone(&EXPOSITION_INCONSISTENT_DROPPED),
            ),
            (
                "textfile_exporter_scrapes_total",
                "Scrapes answered.",
                Arc::clone(&EXPOSITION_REPORT_SUCCESS),
            ),
            (
                "textfile_exporter_scrape_errors_total",
                "Scrapes that could not be answered.",
                Arc::clone(&EXPOSITION_REPORT_ERROR),
            ),
            (
                "textfile_exporter_scrape_render_microseconds_total",
                "Time spent rendering scrapes.",
                Arc::clone(&EXPOSITION_RESPONSE_DELAY_SUM),
            ),
        ];
        let mut counters = Vec::with_capacity(known.len());
        for (name, help, value) in known {
            let desc = Desc::new(name.to_string(), help.to_string(), Vec::new(), HashMap::new())?;
            counters.push(Counter {
                desc: desc,
                value: value,
            });
        }
        Ok(SelfCollector { counters: counters })
    }
}

impl Collector for SelfCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.counters.iter().map(|c| &c.desc).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.counters
            .iter()
            .map(|c| {
                let mut counter = proto::Counter::default();
                counter.set_value(c.value.load(Ordering::Relaxed) as f64);
                let mut metric = proto::Metric::default();
                metric.set_counter(counter);
                let mut family = MetricFamily::default();
                family.set_name(c.desc.fq_name.clone());
                family.set_help(c.desc.help.clone());
                family.set_field_type(MetricType::COUNTER);
                family.mut_metric().push(metric);
                family
            })
            .collect()
    }
}
