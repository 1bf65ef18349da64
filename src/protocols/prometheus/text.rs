//! The prometheus text protocol parser. Defined here:
//! https://prometheus.io/docs/instrumenting/exposition_formats/#text-format-details
//!
//! Every sample line is returned, including the quantile, bucket, `_sum` and
//! `_count` lines of summaries and histograms. Those are marked
//! `SampleKind::Unsupported` and it is up to the caller to drop them.

use metric::{LabelSet, Sample, SampleKind};
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::io;
use std::str::FromStr;

/// Something that turns a byte stream into samples.
pub trait Decoder {
    /// Decode the whole of `input`. Any error rejects the input entirely.
    fn decode(&self, input: &mut dyn io::Read) -> Result<Vec<Sample>, Error>;
}

/// `Decoder` for the prometheus text format, version 0.0.4.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextDecoder;

impl Decoder for TextDecoder {
    fn decode(&self, input: &mut dyn io::Read) -> Result<Vec<Sample>, Error> {
        let mut buffer = String::new();
        input.read_to_string(&mut buffer).map_err(|e| Error {
            line: 0,
            kind: ErrorKind::Io(e.to_string()),
        })?;
        parse(&buffer)
    }
}

/// A parse failure and the 1-based line it happened on. Line 0 means the
/// input could not be read at all.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// Line of the failure.
    pub line: usize,
    /// What went wrong.
    pub kind: ErrorKind,
}

/// The ways a text payload can be malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Reading the input failed, or it was not UTF-8.
    Io(String),
    /// A metric name outside `[a-zA-Z_:][a-zA-Z0-9_:]*`.
    InvalidMetricName(String),
    /// A label name outside `[a-zA-Z_][a-zA-Z0-9_]*`.
    InvalidLabelName(String),
    /// The label name `__name__`, which is reserved.
    ReservedLabelName,
    /// The same label name twice in one sample.
    DuplicateLabel(String),
    /// A backslash escape other than `\\`, `\"` or `\n`.
    InvalidEscape(char),
    /// The line ended or held something unexpected.
    Syntax(&'static str),
    /// The sample value is not a float.
    InvalidValue(String),
    /// The sample timestamp is not an integer.
    InvalidTimestamp(String),
    /// Something follows the timestamp.
    TrailingData(String),
    /// A TYPE line with an unknown type.
    UnknownType(String),
    /// A second HELP line for one family.
    DuplicateHelp(String),
    /// A second TYPE line for one family.
    DuplicateType(String),
    /// A TYPE line after the family's samples.
    TypeAfterSamples(String),
    /// A summary quantile or histogram bucket without its label.
    MissingLabel(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::Io(ref e) => write!(f, "could not read input: {}", e),
            ErrorKind::InvalidMetricName(ref n) => {
                write!(f, "line {}: invalid metric name {:?}", self.line, n)
            }
            ErrorKind::InvalidLabelName(ref n) => {
                write!(f, "line {}: invalid label name {:?}", self.line, n)
            }
            ErrorKind::ReservedLabelName => {
                write!(f, "line {}: label name __name__ is reserved", self.line)
            }
            ErrorKind::DuplicateLabel(ref n) => {
                write!(f, "line {}: duplicate label name {:?}", self.line, n)
            }
            ErrorKind::InvalidEscape(c) => {
                write!(f, "line {}: invalid escape sequence \\{}", self.line, c)
            }
            ErrorKind::Syntax(msg) => write!(f, "line {}: {}", self.line, msg),
            ErrorKind::InvalidValue(ref v) => {
                write!(f, "line {}: invalid value {:?}", self.line, v)
            }
            ErrorKind::InvalidTimestamp(ref t) => {
                write!(f, "line {}: invalid timestamp {:?}", self.line, t)
            }
            ErrorKind::TrailingData(ref d) => {
                write!(f, "line {}: unexpected trailing data {:?}", self.line, d)
            }
            ErrorKind::UnknownType(ref t) => {
                write!(f, "line {}: unknown metric type {:?}", self.line, t)
            }
            ErrorKind::DuplicateHelp(ref n) => {
                write!(f, "line {}: second HELP line for metric {:?}", self.line, n)
            }
            ErrorKind::DuplicateType(ref n) => {
                write!(f, "line {}: second TYPE line for metric {:?}", self.line, n)
            }
            ErrorKind::TypeAfterSamples(ref n) => write!(
                f,
                "line {}: TYPE line for metric {:?} after its samples",
                self.line, n
            ),
            ErrorKind::MissingLabel(l) => {
                write!(f, "line {}: expected label {:?}", self.line, l)
            }
        }
    }
}

impl error::Error for Error {}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FamilyType {
    Counter,
    Gauge,
    Untyped,
    Summary,
    Histogram,
}

impl FamilyType {
    fn sample_kind(self) -> SampleKind {
        match self {
            FamilyType::Counter => SampleKind::Counter,
            FamilyType::Gauge => SampleKind::Gauge,
            FamilyType::Untyped => SampleKind::Untyped,
            FamilyType::Summary | FamilyType::Histogram => SampleKind::Unsupported,
        }
    }
}

#[derive(Debug)]
struct Family {
    typ: FamilyType,
    typed: bool,
    help: Option<String>,
    has_samples: bool,
}

impl Default for Family {
    fn default() -> Family {
        Family {
            typ: FamilyType::Untyped,
            typed: false,
            help: None,
            has_samples: false,
        }
    }
}

struct Pending {
    family: String,
    name: String,
    labels: LabelSet,
    value: f64,
    timestamp: Option<i64>,
}

/// Parse a prometheus text blob
///
/// HELP text is attached to every sample of its family, even if the HELP line
/// comes after the samples.
pub fn parse(source: &str) -> Result<Vec<Sample>, Error> {
    let mut families: HashMap<String, Family> = HashMap::new();
    let mut pending: Vec<Pending> = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let fail = |kind| Error {
            line: line_no,
            kind: kind,
        };
        let mut cur = Cursor::new(line);
        cur.skip_blank();
        match cur.peek() {
            None => continue,
            Some('#') => {
                cur.bump();
                parse_comment(&mut cur, &mut families).map_err(fail)?
            }
            Some(_) => {
                let p = parse_sample(&mut cur, &mut families).map_err(fail)?;
                pending.push(p);
            }
        }
    }

    Ok(pending
        .into_iter()
        .map(|p| {
            let family = &families[&p.family];
            Sample {
                name: p.name,
                labels: p.labels,
                kind: family.typ.sample_kind(),
                value: p.value,
                timestamp: p.timestamp,
                help: family.help.clone().unwrap_or_default(),
            }
        })
        .collect())
}

fn parse_comment(
    cur: &mut Cursor,
    families: &mut HashMap<String, Family>,
) -> Result<(), ErrorKind> {
    cur.skip_blank();
    let keyword = cur.take_while(|c| !is_blank(c));
    if keyword != "HELP" && keyword != "TYPE" {
        // An ordinary comment.
        return Ok(());
    }
    cur.skip_blank();
    let name = cur.take_while(|c| !is_blank(c));
    if name.is_empty() {
        return Err(ErrorKind::Syntax("expected metric name after HELP or TYPE"));
    }
    validate_metric_name(name)?;
    cur.skip_blank();
    let rest = cur.rest();

    let family = families.entry(name.to_string()).or_insert_with(Family::default);
    if keyword == "HELP" {
        if family.help.is_some() {
            return Err(ErrorKind::DuplicateHelp(name.to_string()));
        }
        family.help = Some(unescape_help(rest)?);
    } else {
        if family.typed {
            return Err(ErrorKind::DuplicateType(name.to_string()));
        }
        if family.has_samples {
            return Err(ErrorKind::TypeAfterSamples(name.to_string()));
        }
        family.typ = match rest.trim_end() {
            "counter" => FamilyType::Counter,
            "gauge" => FamilyType::Gauge,
            "untyped" => FamilyType::Untyped,
            "summary" => FamilyType::Summary,
            "histogram" => FamilyType::Histogram,
            other => return Err(ErrorKind::UnknownType(other.to_string())),
        };
        family.typed = true;
    }
    Ok(())
}

fn parse_sample(
    cur: &mut Cursor,
    families: &mut HashMap<String, Family>,
) -> Result<Pending, ErrorKind> {
    let name = cur.take_while(|c| !is_blank(c) && c != '{');
    validate_metric_name(name)?;
    cur.skip_blank();

    let mut labels = LabelSet::new();
    if cur.peek() == Some('{') {
        cur.bump();
        parse_labels(cur, &mut labels)?;
        cur.skip_blank();
    }

    let value = cur.take_while(|c| !is_blank(c));
    if value.is_empty() {
        return Err(ErrorKind::Syntax("expected sample value"));
    }
    let value =
        f64::from_str(value).map_err(|_| ErrorKind::InvalidValue(value.to_string()))?;
    cur.skip_blank();

    let timestamp = match cur.take_while(|c| !is_blank(c)) {
        "" => None,
        ts => Some(
            i64::from_str(ts).map_err(|_| ErrorKind::InvalidTimestamp(ts.to_string()))?,
        ),
    };
    cur.skip_blank();
    if !cur.rest().is_empty() {
        return Err(ErrorKind::TrailingData(cur.rest().to_string()));
    }

    let family_name = resolve_family(families, name);
    let family = families
        .entry(family_name.clone())
        .or_insert_with(Family::default);
    family.has_samples = true;
    match family.typ {
        FamilyType::Summary if family_name == name && labels.get("quantile").is_none() => {
            return Err(ErrorKind::MissingLabel("quantile"));
        }
        FamilyType::Histogram if name.ends_with("_bucket") && labels.get("le").is_none() => {
            return Err(ErrorKind::MissingLabel("le"));
        }
        _ => {}
    }

    Ok(Pending {
        family: family_name,
        name: name.to_string(),
        labels: labels,
        value: value,
        timestamp: timestamp,
    })
}

fn parse_labels(cur: &mut Cursor, labels: &mut LabelSet) -> Result<(), ErrorKind> {
    loop {
        cur.skip_blank();
        if cur.peek() == Some('}') {
            cur.bump();
            return Ok(());
        }
        let name = cur.take_while(|c| !is_blank(c) && c != '=' && c != '}' && c != ',');
        validate_label_name(name)?;
        cur.skip_blank();
        if cur.bump() != Some('=') {
            return Err(ErrorKind::Syntax("expected '=' after label name"));
        }
        cur.skip_blank();
        if cur.bump() != Some('"') {
            return Err(ErrorKind::Syntax("expected '\"' to open label value"));
        }
        let mut value = String::new();
        loop {
            match cur.bump() {
                None => return Err(ErrorKind::Syntax("unterminated label value")),
                Some('"') => break,
                Some('\\') => match cur.bump() {
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('n') => value.push('\n'),
                    Some(c) => return Err(ErrorKind::InvalidEscape(c)),
                    None => return Err(ErrorKind::Syntax("unterminated label value")),
                },
                Some(c) => value.push(c),
            }
        }
        if labels.get(name).is_some() {
            return Err(ErrorKind::DuplicateLabel(name.to_string()));
        }
        labels.insert(name, value);
        cur.skip_blank();
        match cur.bump() {
            Some(',') => continue,
            Some('}') => return Ok(()),
            _ => return Err(ErrorKind::Syntax("expected ',' or '}' after label value")),
        }
    }
}

/// The family a sample line belongs to. A family of the exact name wins.
/// Failing that the `_sum`, `_count` and `_bucket` lines of a declared summary
/// or histogram belong to it. Anything else starts, or continues, a family of
/// its own name.
fn resolve_family(families: &HashMap<String, Family>, name: &str) -> String {
    if families.contains_key(name) {
        return name.to_string();
    }
    for suffix in &["_sum", "_count", "_bucket"] {
        if !name.ends_with(suffix) {
            continue;
        }
        let base = &name[..name.len() - suffix.len()];
        if let Some(family) = families.get(base) {
            match (family.typ, *suffix) {
                (FamilyType::Summary, "_sum")
                | (FamilyType::Summary, "_count")
                | (FamilyType::Histogram, _) => return base.to_string(),
                _ => {}
            }
        }
    }
    name.to_string()
}

fn unescape_help(raw: &str) -> Result<String, ErrorKind> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some(other) => return Err(ErrorKind::InvalidEscape(other)),
            None => return Err(ErrorKind::Syntax("trailing backslash in HELP")),
        }
    }
    Ok(out)
}

fn validate_metric_name(name: &str) -> Result<(), ErrorKind> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ErrorKind::InvalidMetricName(name.to_string()))
    }
}

fn validate_label_name(name: &str) -> Result<(), ErrorKind> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        Err(ErrorKind::InvalidLabelName(name.to_string()))
    } else if name == "__name__" {
        Err(ErrorKind::ReservedLabelName)
    } else {
        Ok(())
    }
}

#[inline]
fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

struct Cursor<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Cursor<'a> {
        Cursor { line: line, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.line[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_blank(&mut self) {
        self.take_while(is_blank);
    }

    fn take_while<F>(&mut self, pred: F) -> &'a str
    where
        F: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.line[start..self.pos]
    }

    fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }
}
