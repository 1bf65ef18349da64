//! Provides the CLI option parser
//!
//! Used to parse the argv/config file into a struct that
//! the server can consume and use as configuration data.

use clap::{App, Arg, ArgMatches};
use std::env;
use std::error;
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use time::{parse_duration, ParseDurationError};
use toml;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// Configuration of a textfile-exporter run
///
/// Built from defaults, then the optional TOML file, then whatever flags were
/// given on the command line, each layer overriding the last.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    /// Port the HTTP server listens on.
    pub listen_port: u16,
    /// Address the HTTP server binds.
    pub host: String,
    /// A `.prom` file, or a directory of them.
    pub path: PathBuf,
    /// Time between ingestion passes.
    pub scan_interval: Duration,
    /// Points older than this are not exposed.
    pub memory_max_age: Duration,
    /// Files not modified for this long are stale.
    pub old_files_age: Duration,
    /// Command run for each stale file, `{}` replaced by its path.
    pub old_files_command: String,
    /// Number of HTTP worker threads.
    pub http_workers: usize,
    /// The verbosity setting. The higher the value the more chatty we get.
    pub verbose: u64,
    /// Version string. This is set automatically.
    pub version: String,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            listen_port: 9014,
            host: "0.0.0.0".to_string(),
            path: PathBuf::from("."),
            scan_interval: Duration::from_secs(30),
            memory_max_age: Duration::from_secs(25 * 60 * 60),
            old_files_age: Duration::from_secs(6 * 60 * 60),
            old_files_command: "ls -l {}".to_string(),
            http_workers: 4,
            verbose: 0,
            version: VERSION.unwrap_or("unknown").to_string(),
        }
    }
}

impl Args {
    /// The `host:port` the HTTP server should bind.
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.listen_port)
    }
}

/// Configuration could not be assembled.
#[derive(Debug)]
pub enum Error {
    /// The command line did not parse, or help or version was asked for.
    Cli(::clap::Error),
    /// The config file could not be read.
    Io(PathBuf, io::Error),
    /// The config file is not valid TOML or has keys of the wrong type.
    Toml(String),
    /// A duration setting did not parse.
    Duration(&'static str, ParseDurationError),
    /// A setting is out of range.
    Invalid(&'static str, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Cli(ref e) => write!(f, "{}", e),
            Error::Io(ref path, ref e) => {
                write!(f, "could not read config file {}: {}", path.display(), e)
            }
            Error::Toml(ref e) => write!(f, "invalid config file: {}", e),
            Error::Duration(key, ref e) => write!(f, "{}: {}", key, e),
            Error::Invalid(key, ref e) => write!(f, "{}: {}", key, e),
        }
    }
}

impl error::Error for Error {}

/// Durations in the config file may be written as strings, `"6h"`, or as
/// integer seconds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Text(String),
    Seconds(u64),
}

impl DurationValue {
    fn resolve(&self, key: &'static str) -> Result<Duration, Error> {
        match *self {
            DurationValue::Text(ref s) => parse_duration(s).map_err(|e| Error::Duration(key, e)),
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(secs)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileConfig {
    listen_port: Option<u16>,
    host: Option<String>,
    path: Option<PathBuf>,
    scan_interval: Option<DurationValue>,
    memory_max_age: Option<DurationValue>,
    old_files_age: Option<DurationValue>,
    old_files_command: Option<String>,
    http_workers: Option<usize>,
}

fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("textfile-exporter")
        .version(VERSION.unwrap_or("unknown"))
        .about("exposes metrics from prometheus textfiles, forgetting them as they age")
        .arg(
            Arg::with_name("config-file")
                .long("config")
                .short("C")
                .value_name("config")
                .help("An optional TOML config file. Flags override it.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("listen-port")
                .long("listen-port")
                .short("l")
                .value_name("port")
                .help("Port to listen on [default: 9014]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("addr")
                .help("Address to listen on [default: 0.0.0.0]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("path")
                .long("path")
                .short("p")
                .value_name("path")
                .help("A .prom file, or a directory of *.prom files [default: .]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("scan-interval")
                .long("scan-interval")
                .short("i")
                .value_name("duration")
                .help("Time between scans [default: 30s]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("memory-max-age")
                .long("memory-max-age")
                .short("m")
                .value_name("duration")
                .help("Max age of in-memory metrics [default: 25h]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("old-files-age")
                .long("old-files-age")
                .short("o")
                .value_name("duration")
                .help("Min age of files considered old [default: 6h]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("old-files-command")
                .long("old-files-command")
                .short("x")
                .value_name("command")
                .help("Command to run on old files, {} is the path [default: ls -l {}]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("http-workers")
                .long("http-workers")
                .value_name("n")
                .help("Number of HTTP worker threads [default: 4]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Turn on verbose output."),
        )
}

/// Parse the process's command line, reading the config file it names if
/// any.
pub fn parse_args() -> Result<Args, Error> {
    parse_args_from(env::args_os())
}

/// Parse `argv`, the first element being the program name.
pub fn parse_args_from<I, T>(argv: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = app().get_matches_from_safe(argv).map_err(Error::Cli)?;
    let mut args = match matches.value_of("config-file") {
        Some(filename) => {
            let path = PathBuf::from(filename);
            let mut buffer = String::new();
            File::open(&path)
                .and_then(|mut fp| fp.read_to_string(&mut buffer))
                .map_err(|e| Error::Io(path.clone(), e))?;
            parse_config_file(&buffer)?
        }
        None => Args::default(),
    };
    args.verbose = matches.occurrences_of("verbose");
    apply_flags(&matches, &mut args)?;
    validate(&args)?;
    Ok(args)
}

fn apply_flags(matches: &ArgMatches, args: &mut Args) -> Result<(), Error> {
    if let Some(port) = matches.value_of("listen-port") {
        args.listen_port = port
            .parse()
            .map_err(|_| Error::Invalid("listen-port", format!("{:?} is not a port", port)))?;
    }
    if let Some(host) = matches.value_of("host") {
        args.host = host.to_string();
    }
    if let Some(path) = matches.value_of("path") {
        args.path = PathBuf::from(path);
    }
    if let Some(d) = matches.value_of("scan-interval") {
        args.scan_interval = parse_duration(d).map_err(|e| Error::Duration("scan-interval", e))?;
    }
    if let Some(d) = matches.value_of("memory-max-age") {
        args.memory_max_age =
            parse_duration(d).map_err(|e| Error::Duration("memory-max-age", e))?;
    }
    if let Some(d) = matches.value_of("old-files-age") {
        args.old_files_age = parse_duration(d).map_err(|e| Error::Duration("old-files-age", e))?;
    }
    if let Some(cmd) = matches.value_of("old-files-command") {
        args.old_files_command = cmd.to_string();
    }
    if let Some(n) = matches.value_of("http-workers") {
        args.http_workers = n.parse().map_err(|_| {
            Error::Invalid("http-workers", format!("{:?} is not a number", n))
        })?;
    }
    Ok(())
}

fn validate(args: &Args) -> Result<(), Error> {
    if args.http_workers == 0 {
        return Err(Error::Invalid("http-workers", "must be at least 1".to_string()));
    }
    if args.scan_interval == Duration::from_secs(0) {
        return Err(Error::Invalid("scan-interval", "must not be zero".to_string()));
    }
    Ok(())
}

/// Parse a TOML config file
///
/// Every key is optional and takes the same name as its long flag, e.g.
/// `old-files-age = "6h"`. Keys left out keep their defaults.
pub fn parse_config_file(buffer: &str) -> Result<Args, Error> {
    let file: FileConfig = toml::from_str(buffer).map_err(|e| Error::Toml(e.to_string()))?;
    let mut args = Args::default();
    if let Some(port) = file.listen_port {
        args.listen_port = port;
    }
    if let Some(host) = file.host {
        args.host = host;
    }
    if let Some(path) = file.path {
        args.path = path;
    }
    if let Some(ref d) = file.scan_interval {
        args.scan_interval = d.resolve("scan-interval")?;
    }
    if let Some(ref d) = file.memory_max_age {
        args.memory_max_age = d.resolve("memory-max-age")?;
    }
    if let Some(ref d) = file.old_files_age {
        args.old_files_age = d.resolve("old-files-age")?;
    }
    if let Some(cmd) = file.old_files_command {
        args.old_files_command = cmd;
    }
    if let Some(n) = file.http_workers {
        args.http_workers = n;
    }
    Ok(args)
}
