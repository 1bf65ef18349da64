//! The data units of textfile-exporter.
//!
//! A decoder produces `Sample`s. The ingestion cycle turns the ones it can
//! represent into `Point`s, which are what the store keeps and what scrapes
//! report.

mod labels;
mod point;

pub use self::labels::LabelSet;
pub use self::point::{Identity, MetricKind, Point, Sample, SampleKind};
