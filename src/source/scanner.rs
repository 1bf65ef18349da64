//! Discovery of the files an ingestion pass reads.

use glob::{glob, Pattern};
use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time;

/// Name of the file whose presence turns on debug mode.
pub const DEBUG_SWITCH: &str = "debug_tfe";
/// How long a touched debug switch stays in effect, in milliseconds.
pub const DEBUG_SWITCH_TTL: i64 = 2 * 60 * 60 * 1000;

/// The scanned path could not be examined.
#[derive(Debug)]
pub enum Error {
    /// `stat` or directory listing failed.
    Io(PathBuf, io::Error),
    /// The path cannot be turned into a glob pattern.
    Pattern(PathBuf, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref path, ref e) => write!(f, "{}: {}", path.display(), e),
            Error::Pattern(ref path, ref e) => {
                write!(f, "{}: cannot search for files: {}", path.display(), e)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(_, ref e) => Some(e),
            Error::Pattern(..) => None,
        }
    }
}

/// The outcome of one scan: candidate files split by age, each list sorted
/// by path.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Scan {
    /// Files recent enough to be ingested.
    pub current: Vec<PathBuf>,
    /// Files not modified within the stale threshold.
    pub stale: Vec<PathBuf>,
}

impl Scan {
    /// Total number of candidate files.
    pub fn len(&self) -> usize {
        self.current.len() + self.stale.len()
    }

    /// True if no candidate was found.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.stale.is_empty()
    }
}

/// Finds `*.prom` files and partitions them into current and stale
///
/// When configured on a directory the scanner lists the regular files
/// directly inside it whose names end in `.prom`. Subdirectories are not
/// descended into. When configured on anything else the path itself is the
/// only candidate.
#[derive(Debug, Clone)]
pub struct Scanner {
    path: PathBuf,
    stale_after: i64,
}

impl Scanner {
    /// Create a scanner over `path`. Files whose modification time is more
    /// than `stale_after` in the past are stale.
    pub fn new<P>(path: P, stale_after: Duration) -> Scanner
    where
        P: Into<PathBuf>,
    {
        Scanner {
            path: path.into(),
            stale_after: time::millis(stale_after),
        }
    }

    /// The configured path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List candidates and split them by modification time at `now`
    ///
    /// A file is stale when `now > mtime + stale_after`. A candidate that
    /// vanishes or cannot be examined between listing and `stat` is skipped.
    pub fn scan(&self, now: i64) -> Result<Scan, Error> {
        let meta = fs::metadata(&self.path).map_err(|e| Error::Io(self.path.clone(), e))?;
        let candidates = if meta.is_dir() {
            self.list()?
        } else {
            vec![self.path.clone()]
        };
        let mut scan = Scan::default();
        for path in candidates {
            let mtime = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => time::system_time_millis(t),
                Err(e) => {
                    warn!("Error stat()ing file {}: {}", path.display(), e);
                    continue;
                }
            };
            if now > mtime.saturating_add(self.stale_after) {
                scan.stale.push(path);
            } else {
                scan.current.push(path);
            }
        }
        Ok(scan)
    }

    fn list(&self) -> Result<Vec<PathBuf>, Error> {
        let dir = self.path.to_str().ok_or_else(|| {
            Error::Pattern(self.path.clone(), "path is not valid UTF-8".to_string())
        })?;
        let pattern = format!("{}/*.prom", Pattern::escape(dir));
        let entries = glob(&pattern).map_err(|e| Error::Pattern(self.path.clone(), e.to_string()))?;
        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => {
                    // Symlinks are not followed.
                    match fs::symlink_metadata(&path) {
                        Ok(ref m) if m.is_file() => files.push(path),
                        Ok(_) => trace!("skipping {}, not a regular file", path.display()),
                        Err(e) => warn!("Error stat()ing file {}: {}", path.display(), e),
                    }
                }
                Err(e) => warn!("Error listing {}: {}", self.path.display(), e),
            }
        }
        files.sort();
        Ok(files)
    }

    /// True if the debug switch file exists in the scanned directory and was
    /// modified no more than two hours before `now`.
    pub fn debug_enabled(&self, now: i64) -> bool {
        let switch = self.path.join(DEBUG_SWITCH);
        match fs::metadata(&switch).and_then(|m| m.modified()) {
            Ok(t) => now - time::system_time_millis(t) <= DEBUG_SWITCH_TTL,
            Err(_) => false,
        }
    }
}
