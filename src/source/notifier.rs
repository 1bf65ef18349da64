//! Stale file notification
//!
//! An ingestion pass hands every stale file to a `Notifier`. The stock
//! notifier runs an operator-supplied shell command with the file's path
//! substituted in, so that something can be done about whatever stopped
//! writing it.

use std::error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::thread;

/// Placeholder replaced by the stale file's path.
pub const PLACEHOLDER: &str = "{}";

/// Bound on notifications queued for a `BackgroundNotifier` worker.
pub const QUEUE_DEPTH: usize = 1024;

/// Receives stale file paths. Implementations must not fail the caller:
/// errors are logged and dropped.
pub trait Notifier {
    /// Report that `path` has gone stale.
    fn notify(&self, path: &Path);
}

/// A notification command could not be run.
#[derive(Debug)]
pub enum Error {
    /// `sh` could not be spawned or waited on.
    Spawn(String, io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Spawn(ref cmd, ref e) => write!(f, "could not run {:?}: {}", cmd, e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Spawn(_, ref e) => Some(e),
        }
    }
}

/// What came of running a notification command.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// The command line after substitution.
    pub command: String,
    /// True if the command exited zero.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Runs a shell command for every stale file
///
/// Every `{}` in the template is replaced with the path and the result is
/// run with `sh -c`. The command runs to completion on the calling thread.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    template: String,
}

impl CommandNotifier {
    /// Create a notifier running `template`.
    pub fn new<S>(template: S) -> CommandNotifier
    where
        S: Into<String>,
    {
        CommandNotifier {
            template: template.into(),
        }
    }

    /// The command line that would be run for `path`.
    pub fn command_for(&self, path: &Path) -> String {
        self.template
            .replace(PLACEHOLDER, &path.to_string_lossy())
    }

    /// Run the command for `path` and collect its outcome.
    pub fn run(&self, path: &Path) -> Result<Notification, Error> {
        let command = self.command_for(path);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .output()
            .map_err(|e| Error::Spawn(command.clone(), e))?;
        Ok(Notification {
            command: command,
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, path: &Path) {
        match self.run(path) {
            Ok(n) => {
                info!("Running command {}", n.command);
                if !n.success {
                    warn!("Error running command {}: {}", n.command, n.stderr.trim_end());
                }
                info!("output:\n<<<\n{}>>>", n.stdout);
            }
            Err(e) => warn!("Error running command: {}", e),
        }
    }
}

/// Moves notification off the calling thread
///
/// Paths are queued to a single worker thread that hands them to the wrapped
/// notifier in order. `notify` never blocks: when the queue is full the path
/// is dropped with a warning. Dropping the `BackgroundNotifier` closes the
/// queue; the worker finishes what is queued and exits.
pub struct BackgroundNotifier {
    sender: mpsc::SyncSender<PathBuf>,
}

impl BackgroundNotifier {
    /// Start a worker thread feeding `notifier`.
    pub fn new<N>(notifier: N) -> io::Result<BackgroundNotifier>
    where
        N: Notifier + Send + 'static,
    {
        BackgroundNotifier::with_depth(notifier, QUEUE_DEPTH)
    }

    /// Start a worker thread feeding `notifier`, queueing at most `depth`
    /// paths.
    pub fn with_depth<N>(notifier: N, depth: usize) -> io::Result<BackgroundNotifier>
    where
        N: Notifier + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel::<PathBuf>(depth);
        thread::Builder::new()
            .name("notifier".to_string())
            .spawn(move || {
                for path in receiver {
                    notifier.notify(&path);
                }
                debug!("notifier queue closed, worker exiting");
            })?;
        Ok(BackgroundNotifier { sender: sender })
    }
}

impl Notifier for BackgroundNotifier {
    fn notify(&self, path: &Path) {
        match self.sender.try_send(path.to_path_buf()) {
            Ok(()) => {}
            Err(mpsc::TrySendError::Full(p)) => {
                warn!("notifier queue full, dropping {}", p.display())
            }
            Err(mpsc::TrySendError::Disconnected(p)) => {
                error!("notifier worker gone, dropping {}", p.display())
            }
        }
    }
}
