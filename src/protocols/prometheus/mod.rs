//! The text protocol for prometheus, defined here:
//! https://prometheus.io/docs/instrumenting/exposition_formats/

pub mod text;

pub use self::text::{Decoder, TextDecoder};
