#![allow(unknown_lints)]

extern crate chrono;
extern crate fern;
extern crate textfile_exporter;

#[macro_use]
extern crate log;

use chrono::Utc;
use std::process;
use std::sync::Arc;
use std::thread;
use textfile_exporter::config;
use textfile_exporter::exposition::{self, ScrapeHandler};
use textfile_exporter::http;
use textfile_exporter::protocols::prometheus::TextDecoder;
use textfile_exporter::source::{BackgroundNotifier, CommandNotifier, Scanner, Source,
                                TextfileSource};
use textfile_exporter::store::Store;

fn main() {
    let args = match config::parse_args() {
        Ok(args) => args,
        Err(config::Error::Cli(e)) => e.exit(),
        Err(e) => {
            eprintln!("textfile-exporter: {}", e);
            process::exit(2);
        }
    };

    let level = match args.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Err(e) = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                record.module_path().unwrap_or("?"),
                record.line().unwrap_or(0),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
    {
        eprintln!("textfile-exporter: could not set up logging: {}", e);
        process::exit(1);
    }

    info!("textfile-exporter - {}", args.version);
    info!(
        "path={} scan-interval={:?} memory-max-age={:?} old-files-age={:?} old-files-command={:?}",
        args.path.display(),
        args.scan_interval,
        args.memory_max_age,
        args.old_files_age,
        args.old_files_command
    );

    let store = Arc::new(Store::new());

    let notifier = match BackgroundNotifier::new(CommandNotifier::new(args.old_files_command.clone())) {
        Ok(n) => n,
        Err(e) => {
            error!("could not start notifier: {}", e);
            process::exit(1);
        }
    };
    let mut source = TextfileSource::new(
        Arc::clone(&store),
        Scanner::new(args.path.clone(), args.old_files_age),
        TextDecoder,
        notifier,
        args.scan_interval,
    );
    if let Err(e) = thread::Builder::new()
        .name("ingest".to_string())
        .spawn(move || source.run())
    {
        error!("could not start ingestion: {}", e);
        process::exit(1);
    }

    let registry = match exposition::registry(store, args.memory_max_age) {
        Ok(registry) => registry,
        Err(e) => {
            error!("could not register collectors: {}", e);
            process::exit(1);
        }
    };
    let handler = ScrapeHandler::new(registry);

    match http::Server::new(args.host_port(), handler, args.http_workers) {
        Ok(server) => server.join(),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
