use metric::LabelSet;
use std::fmt;

/// The kinds of series the store can hold
///
/// Every kind here is representable as a single scalar. Summaries and
/// histograms are not, and never make it past `Point::from_sample`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    /// A value that can go up and down.
    Gauge,
    /// A monotonically increasing value.
    Counter,
    /// A value of unknown semantics.
    Untyped,
}

impl MetricKind {
    /// The name of this kind in the text exposition format.
    pub fn as_str(&self) -> &'static str {
        match *self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Untyped => "untyped",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classification a decoder gives each sample
///
/// `Unsupported` covers every sample line belonging to a summary or histogram
/// family: quantiles, buckets, `_sum` and `_count` alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Sample of a gauge family.
    Gauge,
    /// Sample of a counter family.
    Counter,
    /// Sample of an untyped or undeclared family.
    Untyped,
    /// Sample of a summary or histogram family.
    Unsupported,
}

/// A sample as it comes out of a decoder, before the ingestion policy is
/// applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The sample name as written, e.g. `foo_count` for a summary part.
    pub name: String,
    /// Labels exactly as decoded.
    pub labels: LabelSet,
    /// Kind derived from the sample's family.
    pub kind: SampleKind,
    /// The sample value.
    pub value: f64,
    /// Milliseconds since the epoch, if the input carried a timestamp.
    pub timestamp: Option<i64>,
    /// The family's help text, empty if none was declared.
    pub help: String,
}

/// The identity of a series: its name and its label set
///
/// Identities order by name first and then by labels, which is the order
/// snapshots are returned in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    /// Metric name.
    pub name: String,
    /// Sorted labels.
    pub labels: LabelSet,
}

impl Identity {
    /// Create an identity.
    pub fn new<S>(name: S, labels: LabelSet) -> Identity
    where
        S: Into<String>,
    {
        Identity {
            name: name.into(),
            labels: labels,
        }
    }
}

/// One observation of a series, as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Which series this point belongs to.
    pub identity: Identity,
    /// The series kind.
    pub kind: MetricKind,
    /// The observed value.
    pub value: f64,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    /// Help text of the series' family.
    pub help: String,
}

impl Point {
    /// Create a point with no help text.
    pub fn new<S>(name: S, labels: LabelSet, kind: MetricKind, value: f64, timestamp: i64) -> Point
    where
        S: Into<String>,
    {
        Point {
            identity: Identity::new(name, labels),
            kind: kind,
            value: value,
            timestamp: timestamp,
            help: String::new(),
        }
    }

    /// Set the help text.
    pub fn help<S>(mut self, help: S) -> Point
    where
        S: Into<String>,
    {
        self.help = help.into();
        self
    }

    /// The series name.
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// The series labels.
    pub fn labels(&self) -> &LabelSet {
        &self.identity.labels
    }

    /// Age of this point at `now`, in milliseconds. Negative for points
    /// stamped in the future.
    pub fn age(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }

    /// Apply the ingestion policy to a decoded sample
    ///
    /// Returns None for `SampleKind::Unsupported`. Samples without a
    /// timestamp, or with a non-positive one, are stamped with `ingested_at`.
    /// Labels are carried over verbatim.
    pub fn from_sample(sample: Sample, ingested_at: i64) -> Option<Point> {
        let kind = match sample.kind {
            SampleKind::Gauge => MetricKind::Gauge,
            SampleKind::Counter => MetricKind::Counter,
            SampleKind::Untyped => MetricKind::Untyped,
            SampleKind::Unsupported => return None,
        };
        let timestamp = match sample.timestamp {
            Some(ts) if ts > 0 => ts,
            _ => ingested_at,
        };
        Some(Point {
            identity: Identity::new(sample.name, sample.labels),
            kind: kind,
            value: sample.value,
            timestamp: timestamp,
            help: sample.help,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck::{Arbitrary, Gen, QuickCheck, TestResult};

    impl Arbitrary for SampleKind {
        fn arbitrary(g: &mut Gen) -> Self {
            *g.choose(&[
                SampleKind::Gauge,
                SampleKind::Counter,
                SampleKind::Untyped,
                SampleKind::Unsupported,
            ]).unwrap()
        }
    }

    impl Arbitrary for Sample {
        fn arbitrary(g: &mut Gen) -> Self {
            let pairs: Vec<(String, String)> = Arbitrary::arbitrary(g);
            Sample {
                name: Arbitrary::arbitrary(g),
                labels: pairs.into_iter().collect(),
                kind: Arbitrary::arbitrary(g),
                value: Arbitrary::arbitrary(g),
                timestamp: Arbitrary::arbitrary(g),
                help: Arbitrary::arbitrary(g),
            }
        }
    }

    #[test]
    fn test_unsupported_never_becomes_a_point() {
        fn inner(sample: Sample, now: i64) -> TestResult {
            let unsupported = sample.kind == SampleKind::Unsupported;
            let point = Point::from_sample(sample, now);
            assert_eq!(unsupported, point.is_none());
            TestResult::passed()
        }
        QuickCheck::new().quickcheck(inner as fn(Sample, i64) -> TestResult);
    }

    #[test]
    fn test_timestamp_defaulting() {
        fn inner(mut sample: Sample, now: i64) -> TestResult {
            if sample.kind == SampleKind::Unsupported {
                return TestResult::discard();
            }
            let original = sample.timestamp;
            sample.labels.insert("k", "v");
            let labels = sample.labels.clone();
            let point = Point::from_sample(sample, now).unwrap();
            match original {
                Some(ts) if ts > 0 => assert_eq!(point.timestamp, ts),
                _ => assert_eq!(point.timestamp, now),
            }
            assert_eq!(point.labels(), &labels);
            TestResult::passed()
        }
        QuickCheck::new().quickcheck(inner as fn(Sample, i64) -> TestResult);
    }

    #[test]
    fn test_kind_mapping() {
        let sample = Sample {
            name: "jobs_done".to_string(),
            labels: LabelSet::new(),
            kind: SampleKind::Counter,
            value: 7.0,
            timestamp: Some(1_000),
            help: "Jobs completed.".to_string(),
        };
        let point = Point::from_sample(sample, 5_000).unwrap();
        assert_eq!(point.kind, MetricKind::Counter);
        assert_eq!(point.name(), "jobs_done");
        assert_eq!(point.value, 7.0);
        assert_eq!(point.timestamp, 1_000);
        assert_eq!(point.help, "Jobs completed.");
        assert_eq!(point.age(5_000), 4_000);
    }
}
