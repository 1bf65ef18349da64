use exposition::text::{write_text, CONTENT_TYPE};
use exposition::{EXPOSITION_REPORT_ERROR, EXPOSITION_REPORT_SUCCESS,
                 EXPOSITION_RESPONSE_DELAY_SUM};
use flate2::Compression;
use flate2::write::GzEncoder;
use http;
use prometheus::Registry;
use std::io;
use std::sync::atomic::Ordering;
use std::time::Instant;

const ALIVE_BODY: &str = "i'm alive\n";

/// Serves `/metrics` from a `Registry` and `/alive` unconditionally
///
/// Scrapes are gzip-compressed when the client says it accepts gzip.
pub struct ScrapeHandler {
    registry: Registry,
}

impl ScrapeHandler {
    /// Create a handler answering scrapes from `registry`.
    pub fn new(registry: Registry) -> ScrapeHandler {
        ScrapeHandler { registry: registry }
    }

    fn render(&self, gzip: bool) -> io::Result<Vec<u8>> {
        let families = self.registry.gather();
        if gzip {
            let enc = GzEncoder::new(Vec::new(), Compression::fast());
            write_text(&families, enc)?.finish()
        } else {
            write_text(&families, Vec::with_capacity(4096))
        }
    }

    fn metrics(&self, gzip: bool) -> http::Response {
        let now = Instant::now();
        let rendered = self.render(gzip);
        let elapsed = now.elapsed();
        let us = elapsed.as_secs() * 1_000_000 + u64::from(elapsed.subsec_micros());
        EXPOSITION_RESPONSE_DELAY_SUM.fetch_add(us as usize, Ordering::Relaxed);
        match rendered {
            Ok(body) => {
                let mut response = with_header(
                    http::Response::from_data(body),
                    "Content-Type",
                    CONTENT_TYPE,
                );
                if gzip {
                    response = with_header(response, "Content-Encoding", "gzip");
                }
                response
            }
            Err(e) => {
                error!("Failed to render scrape: {}", e);
                http::Response::from_string(format!("could not render metrics: {}\n", e))
                    .with_status_code(500)
            }
        }
    }
}

fn accepts_gzip(request: &http::Request) -> bool {
    request
        .headers()
        .iter()
        .filter(|h| h.field.equiv("Accept-Encoding"))
        .any(|h| gzip_acceptable(h.value.as_str()))
}

/// Whether an `Accept-Encoding` value lists gzip with a non-zero quality.
fn gzip_acceptable(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|coding| {
        let mut params = coding.split(';').map(str::trim);
        match params.next() {
            Some(name) if name.eq_ignore_ascii_case("gzip") => {}
            _ => return false,
        }
        let quality = params
            .find(|p| p.get(..2).map_or(false, |k| k.eq_ignore_ascii_case("q=")))
            .map(|p| p[2..].trim().parse::<f64>().unwrap_or(0.0))
            .unwrap_or(1.0);
        quality > 0.0
    })
}

fn with_header(response: http::Response, field: &str, value: &str) -> http::Response {
    match http::Header::from_bytes(field.as_bytes(), value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

impl http::Handler for ScrapeHandler {
    fn handle(&self, request: http::Request) {
        let path = request.url().split('?').next().unwrap_or("").to_string();
        let response = match path.as_str() {
            "/metrics" => self.metrics(accepts_gzip(&request)),
            "/alive" => {
                info!("confirming i'm alive");
                http::Response::from_string(ALIVE_BODY)
            }
            _ => http::Response::from_string("404 page not found\n").with_status_code(404),
        };
        let scrape = path == "/metrics";
        match request.respond(response) {
            Ok(_) => if scrape {
                EXPOSITION_REPORT_SUCCESS.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => {
                if scrape {
                    EXPOSITION_REPORT_ERROR.fetch_add(1, Ordering::Relaxed);
                }
                warn!("Failed to send response to {}: {:?}", path, e);
            }
        }
    }
}
