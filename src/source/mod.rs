//! Where points come from
//!
//! The only source is `TextfileSource`, which rebuilds the store from a
//! directory of Prometheus textfiles on an interval. `Scanner` decides which
//! files a pass reads and `Notifier` is told about the ones it doesn't.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

pub mod notifier;
pub mod scanner;
mod textfile;

pub use self::notifier::{BackgroundNotifier, CommandNotifier, Notifier};
pub use self::scanner::{Scan, Scanner};
pub use self::textfile::{PassReport, TextfileSource};

lazy_static! {
    /// Total files decoded successfully
    pub static ref SOURCE_FILES_INGESTED: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    /// Total files skipped for failing to open or decode
    pub static ref SOURCE_DECODE_ERRORS: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    /// Total stale files handed to the notifier
    pub static ref SOURCE_STALE_FILES: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    /// Total summary and histogram samples dropped
    pub static ref SOURCE_UNSUPPORTED_DROPPED: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
}

/// A long-running producer of points.
pub trait Source {
    /// Run forever.
    fn run(&mut self) -> ();
}
