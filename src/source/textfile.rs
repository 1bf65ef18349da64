use metric::Point;
use protocols::prometheus::Decoder;
use source::notifier::Notifier;
use source::scanner::{self, Scanner};
use source::{Source, SOURCE_DECODE_ERRORS, SOURCE_FILES_INGESTED, SOURCE_STALE_FILES,
             SOURCE_UNSUPPORTED_DROPPED};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use store::{GenerationHandle, Store};
use time;

/// Files at either end of a pass that get progress lines outside of debug
/// mode.
const PROGRESS_EDGE: usize = 5;

/// Summary of one ingestion pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassReport {
    /// Candidate files found by the scanner.
    pub files: usize,
    /// Files recent enough to be read.
    pub current: usize,
    /// Files handed to the notifier instead of being read.
    pub stale: usize,
    /// Distinct series in the committed generation.
    pub points: usize,
    /// Current files skipped because they could not be opened or decoded.
    pub decode_errors: usize,
    /// Summary and histogram samples dropped.
    pub unsupported: usize,
    /// Id of the committed generation.
    pub generation: u64,
    /// Whether the debug switch was on for this pass.
    pub debug: bool,
}

/// Periodically rebuilds the store from a directory of textfiles
///
/// Each pass scans for files, decodes every current one into a fresh
/// generation, commits that generation in one step and then reports stale
/// files to the notifier. Whatever a pass did not find is gone from the store
/// once it commits.
pub struct TextfileSource<D, N> {
    store: Arc<Store>,
    scanner: Scanner,
    decoder: D,
    notifier: N,
    interval: Duration,
}

impl<D, N> TextfileSource<D, N>
where
    D: Decoder,
    N: Notifier,
{
    /// Create a source that fills `store` every `interval`.
    pub fn new(
        store: Arc<Store>,
        scanner: Scanner,
        decoder: D,
        notifier: N,
        interval: Duration,
    ) -> TextfileSource<D, N> {
        TextfileSource {
            store: store,
            scanner: scanner,
            decoder: decoder,
            notifier: notifier,
            interval: interval,
        }
    }

    /// Run one ingestion pass as of `now`
    ///
    /// Points without a usable timestamp of their own are stamped `now`. A
    /// scanner error aborts the pass before anything is written; the store
    /// keeps its previous generation.
    pub fn pass(&self, now: i64) -> Result<PassReport, scanner::Error> {
        let debug = self.scanner.debug_enabled(now);
        if debug {
            info!("*** DEBUG MODE ENABLED ***");
        }
        let scan = self.scanner.scan(now)?;
        let n = scan.len();
        info!("Found {} files", n);

        let mut report = PassReport {
            files: n,
            current: scan.current.len(),
            stale: scan.stale.len(),
            debug: debug,
            ..PassReport::default()
        };
        let mut gen = self.store.begin_generation();
        for (i, path) in scan.current.iter().enumerate() {
            let chatty = debug || i < PROGRESS_EDGE || i + PROGRESS_EDGE >= n;
            if chatty {
                info!("{}/{} Processing file {}", i + 1, n, path.display());
            }
            match self.ingest(path, now, debug, &mut gen) {
                Ok((found, unsupported)) => {
                    SOURCE_FILES_INGESTED.fetch_add(1, Ordering::Relaxed);
                    report.unsupported += unsupported;
                    if unsupported > 0 {
                        SOURCE_UNSUPPORTED_DROPPED.fetch_add(unsupported, Ordering::Relaxed);
                        debug!(
                            "{}/{} dropped {} summary and histogram samples from {}",
                            i + 1,
                            n,
                            unsupported,
                            path.display()
                        );
                    }
                    if chatty {
                        info!("{}/{}    found {} data points", i + 1, n, found);
                    }
                }
                Err(e) => {
                    SOURCE_DECODE_ERRORS.fetch_add(1, Ordering::Relaxed);
                    report.decode_errors += 1;
                    warn!("{}/{} Error parsing file {}: {}", i + 1, n, path.display(), e);
                }
            }
        }
        report.points = gen.len();
        report.generation = self.store.commit_generation(gen);

        let offset = scan.current.len();
        for (i, path) in scan.stale.iter().enumerate() {
            info!("{}/{} Old file {}", offset + i + 1, n, path.display());
            SOURCE_STALE_FILES.fetch_add(1, Ordering::Relaxed);
            self.notifier.notify(path);
        }
        Ok(report)
    }

    /// Decode `path` into `gen`, returning the number of points put and the
    /// number of unsupported samples dropped.
    fn ingest(
        &self,
        path: &Path,
        now: i64,
        debug: bool,
        gen: &mut GenerationHandle,
    ) -> Result<(usize, usize), String> {
        let mut fp = File::open(path).map_err(|e| e.to_string())?;
        let samples = self.decoder.decode(&mut fp).map_err(|e| e.to_string())?;
        let mut found = 0;
        let mut unsupported = 0;
        for sample in samples {
            match Point::from_sample(sample, now) {
                Some(point) => {
                    if debug {
                        log_point(&point);
                    }
                    gen.put(point);
                    found += 1;
                }
                None => unsupported += 1,
            }
        }
        Ok((found, unsupported))
    }
}

fn log_point(point: &Point) {
    info!("Metric Name: {}", point.name());
    info!("Metric Type: {}", point.kind);
    info!("Metric Help: {}", point.help);
    info!("  Metric Value: {}", point.value);
    info!("  Timestamp: {}", point.timestamp);
    for &(ref k, ref v) in point.labels() {
        info!("  Label_Name:  {}", k);
        info!("  Label_Value: {}", v);
    }
    info!("-----------");
}

impl<D, N> Source for TextfileSource<D, N>
where
    D: Decoder,
    N: Notifier,
{
    fn run(&mut self) {
        loop {
            match self.pass(time::now()) {
                Ok(report) => info!(
                    "committed generation {}: {} points from {} of {} files, {} stale, {} failed, {} unsupported samples dropped",
                    report.generation,
                    report.points,
                    report.current - report.decode_errors,
                    report.files,
                    report.stale,
                    report.decode_errors,
                    report.unsupported
                ),
                Err(e) => error!("scan failed, retrying in {:?}: {}", self.interval, e),
            }
            thread::sleep(self.interval);
        }
    }
}
