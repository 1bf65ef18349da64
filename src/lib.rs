//! textfile-exporter re-exposes Prometheus text files written by other
//! processes. Batch jobs, cron scripts and anything else that cannot host its
//! own scrape endpoint drop `*.prom` files into a directory; this program scans
//! that directory on an interval, keeps the most recent value of every series
//! it finds and serves them to Prometheus on `/metrics`.
//!
//! The interesting part is the `store`. Each scan builds a complete new
//! generation of points off to the side and swaps it in atomically, so a
//! scrape never sees a half-scanned directory. Points also age out at read
//! time: a series that has not been refreshed within the configured window is
//! simply not reported, without any write having to happen.
//!
//! Files that have not been modified for a configurable period are not
//! ingested at all. Instead an operator supplied command is run on them,
//! typically to alert on or clean up abandoned metric files.
#![allow(unknown_lints)]
#![deny(trivial_numeric_casts, missing_docs, unstable_features, unused_import_braces)]
extern crate arc_swap;
extern crate chrono;
extern crate clap;
extern crate flate2;
extern crate glob;
extern crate prometheus;
extern crate serde;
extern crate tiny_http;
extern crate toml;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
extern crate tempdir;

pub mod config;
pub mod exposition;
pub mod http;
pub mod metric;
pub mod protocols;
pub mod source;
pub mod store;
pub mod time;
