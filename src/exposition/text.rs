//! Writes families in the prometheus text format, version 0.0.4.

use prometheus::proto::{LabelPair, Metric, MetricFamily, MetricType};
use std::io;
use std::io::Write;

/// Content type of what `write_text` produces.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Write `families` to `buffer`, returning the buffer
///
/// Each family gets a `# HELP` line if it has help text, a `# TYPE` line and
/// one line per metric. Metrics carrying a timestamp have it appended in
/// milliseconds. Summary and histogram families have no single value per
/// metric and are skipped.
pub fn write_text<W>(families: &[MetricFamily], mut buffer: W) -> io::Result<W>
where
    W: Write,
{
    for family in families {
        let kind = match type_name(family.get_field_type()) {
            Some(kind) => kind,
            None => {
                debug!(
                    "not writing {:?} family {}",
                    family.get_field_type(),
                    family.get_name()
                );
                continue;
            }
        };
        if !family.get_help().is_empty() {
            buffer.write_all(b"# HELP ")?;
            buffer.write_all(family.get_name().as_bytes())?;
            buffer.write_all(b" ")?;
            buffer.write_all(escape_help(family.get_help()).as_bytes())?;
            buffer.write_all(b"\n")?;
        }
        buffer.write_all(b"# TYPE ")?;
        buffer.write_all(family.get_name().as_bytes())?;
        buffer.write_all(b" ")?;
        buffer.write_all(kind.as_bytes())?;
        buffer.write_all(b"\n")?;
        for metric in family.get_metric() {
            write_metric(family, metric, &mut buffer)?;
        }
    }
    Ok(buffer)
}

fn type_name(field_type: MetricType) -> Option<&'static str> {
    match field_type {
        MetricType::GAUGE => Some("gauge"),
        MetricType::COUNTER => Some("counter"),
        MetricType::UNTYPED => Some("untyped"),
        _ => None,
    }
}

fn write_metric<W>(family: &MetricFamily, metric: &Metric, buffer: &mut W) -> io::Result<()>
where
    W: Write,
{
    let value = match family.get_field_type() {
        MetricType::GAUGE => metric.get_gauge().get_value(),
        MetricType::COUNTER => metric.get_counter().get_value(),
        _ => metric.get_untyped().get_value(),
    };
    buffer.write_all(family.get_name().as_bytes())?;
    fmt_labels(metric.get_label(), buffer)?;
    buffer.write_all(b" ")?;
    buffer.write_all(fmt_value(value).as_bytes())?;
    let ts = metric.get_timestamp_ms();
    if ts != 0 {
        buffer.write_all(b" ")?;
        buffer.write_all(ts.to_string().as_bytes())?;
    }
    buffer.write_all(b"\n")
}

#[inline]
fn fmt_labels<W>(labels: &[LabelPair], buffer: &mut W) -> io::Result<()>
where
    W: Write,
{
    if labels.is_empty() {
        return Ok(());
    }
    buffer.write_all(b"{")?;
    for (idx, pair) in labels.iter().enumerate() {
        if idx > 0 {
            buffer.write_all(b",")?;
        }
        buffer.write_all(pair.get_name().as_bytes())?;
        buffer.write_all(b"=\"")?;
        buffer.write_all(escape_label_value(pair.get_value()).as_bytes())?;
        buffer.write_all(b"\"")?;
    }
    buffer.write_all(b"}")
}

fn fmt_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else {
        value.to_string()
    }
}

fn escape_help(help: &str) -> String {
    let mut out = String::with_capacity(help.len());
    for c in help.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}
