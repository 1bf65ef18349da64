//! The input protocols that textfile-exporter must parse. These modules are
//! used by the sources to do their work.

pub mod prometheus;
