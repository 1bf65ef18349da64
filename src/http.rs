//! Tiny, unassuming HTTP server

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tiny_http;

/// An incoming request. Respond to it to complete it.
pub type Request = tiny_http::Request;
/// The response type handlers send.
pub type Response = tiny_http::Response<io::Cursor<Vec<u8>>>;
/// An HTTP header.
pub type Header = tiny_http::Header;

/// HTTP request handler, shared by every worker thread.
pub trait Handler: Sync + Send {
    /// Answer `request`.
    fn handle(&self, request: Request) -> ();
}

/// The server could not bind its listening socket.
#[derive(Debug)]
pub struct Error {
    host_port: String,
    reason: String,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "could not listen on {}: {}", self.host_port, self.reason)
    }
}

impl error::Error for Error {}

/// Multi-threaded HTTP server
///
/// A fixed pool of worker threads pull requests off one listening socket, so
/// up to `workers` requests are handled concurrently.
pub struct Server {
    inner: Arc<tiny_http::Server>,
    stop: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
}

fn http_server<H>(server: &tiny_http::Server, stop: &AtomicBool, handler: &H)
where
    H: Handler,
{
    loop {
        match server.recv() {
            Ok(request) => handler.handle(request),
            Err(e) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                warn!("Failed to receive HTTP request: {:?}", e);
            }
        }
    }
}

impl Server {
    /// Bind `host_port` and start `workers` threads answering requests with
    /// `handler`.
    pub fn new<H>(host_port: String, handler: H, workers: usize) -> Result<Self, Error>
    where
        H: Handler + 'static,
    {
        let inner = match tiny_http::Server::http(host_port.as_str()) {
            Ok(srv) => Arc::new(srv),
            Err(e) => {
                return Err(Error {
                    host_port: host_port,
                    reason: e.to_string(),
                })
            }
        };
        let handler = Arc::new(handler);
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers.max(1) {
            let srv = Arc::clone(&inner);
            let hndl = Arc::clone(&handler);
            let stp = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name(format!("http-{}", id))
                .spawn(move || http_server(&srv, &stp, &*hndl))
                .map_err(|e| Error {
                    host_port: host_port.clone(),
                    reason: e.to_string(),
                })?;
            handles.push(handle);
        }
        info!("HTTP server listening on {} with {} workers", host_port, handles.len());
        Ok(Server {
            inner: inner,
            stop: stop,
            workers: handles,
        })
    }

    /// The port actually bound. Useful when binding port 0.
    pub fn port(&self) -> Option<u16> {
        self.inner.server_addr().to_ip().map(|addr| addr.port())
    }

    /// Block until every worker exits.
    pub fn join(self) {
        for worker in self.workers {
            if worker.join().is_err() {
                error!("HTTP worker panicked");
            }
        }
    }

    /// Stop accepting requests and wait for the workers to finish what they
    /// are doing.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        for _ in &self.workers {
            self.inner.unblock();
        }
        self.join();
    }
}
