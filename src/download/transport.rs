//! HTTP transport construction and ownership.
//!
//! A [`TransportHandle`] pairs a shared [`HttpTransport`] with an explicit
//! [`Ownership`] tag. Transports the engine builds for an item are closed when
//! the item finishes; transports supplied by the caller are only closed when
//! the caller opted in.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use tracing::debug;

use super::error::DownloadError;
use super::input::DownloadRequest;
use super::log::{LogLevel, LogSink};
use super::tls::current_floor;
use crate::user_agent::generate_default_headers;

/// Default per-request timeout (5 minutes for slow mirrors).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum redirects followed before a request fails.
const MAX_REDIRECTS: usize = 10;

/// Settings for a transport the engine builds itself.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Connect and per-read timeout.
    pub timeout: Duration,
    /// Accept invalid or self-signed certificates.
    pub ignore_ssl_errors: bool,
    /// Headers attached to every request; generated defaults when `None`.
    pub headers: Option<HeaderMap>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            ignore_ssl_errors: false,
            headers: None,
        }
    }
}

/// A reusable HTTP client that can be closed explicitly.
///
/// Once closed, every request through it fails with
/// [`DownloadError::TransportSetup`].
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Builds a transport with gzip/deflate decompression, redirect following,
    /// and the current process TLS floor.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::TransportSetup`] if the client cannot be built.
    pub fn build(options: &TransportOptions) -> Result<Self, DownloadError> {
        let client = base_client_builder(options)
            .build()
            .map_err(|e| DownloadError::transport_setup("failed to build HTTP client", Some(e)))?;
        Ok(Self::from_client(client))
    }

    /// Wraps an already configured client.
    ///
    /// The client's own timeout, TLS and redirect configuration apply.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    /// Closes the transport. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns the underlying client while the transport is open.
    pub(crate) fn client(&self) -> Result<&Client, DownloadError> {
        if self.is_closed() {
            return Err(DownloadError::transport_setup(
                "transport has been closed",
                None,
            ));
        }
        Ok(&self.client)
    }
}

/// Who is responsible for closing a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Built by the engine for one item; closed when the item finishes.
    Engine,
    /// Supplied by the caller; closed only if `dispose` is set.
    Caller {
        /// Whether the caller asked the engine to close it afterwards.
        dispose: bool,
    },
}

/// A transport together with its ownership tag.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    transport: Arc<HttpTransport>,
    ownership: Ownership,
}

impl TransportHandle {
    /// Wraps a caller-owned transport.
    #[must_use]
    pub fn borrowed(transport: Arc<HttpTransport>, dispose: bool) -> Self {
        Self {
            transport,
            ownership: Ownership::Caller { dispose },
        }
    }

    pub(crate) fn owned(transport: HttpTransport) -> Self {
        Self {
            transport: Arc::new(transport),
            ownership: Ownership::Engine,
        }
    }

    /// Returns the shared transport.
    #[must_use]
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    /// Returns the ownership tag.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Returns true for caller-supplied transports.
    #[must_use]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.ownership, Ownership::Caller { .. })
    }

    /// Returns true when releasing this handle closes the transport.
    #[must_use]
    pub fn closes_on_release(&self) -> bool {
        matches!(
            self.ownership,
            Ownership::Engine | Ownership::Caller { dispose: true }
        )
    }

    /// Gives the handle back, closing the transport if its owner says so.
    ///
    /// Returns true if this call closed the transport.
    pub fn release(self, sink: &dyn LogSink) -> bool {
        if !self.closes_on_release() {
            debug!("leaving caller-owned transport open");
            return false;
        }
        let closed = self.transport.close();
        if !closed {
            sink.log(LogLevel::Warning, "transport was already closed before release");
        }
        closed
    }
}

/// Builds or borrows the transport for one request.
///
/// # Errors
///
/// Returns [`DownloadError::TransportSetup`] if a supplied transport is already
/// closed, a custom header is invalid, or the client cannot be built.
pub fn acquire_transport(
    request: &DownloadRequest,
    sink: &dyn LogSink,
) -> Result<TransportHandle, DownloadError> {
    if let Some(handle) = &request.transport {
        if handle.transport().is_closed() {
            return Err(DownloadError::transport_setup(
                "caller-supplied transport is closed",
                None,
            ));
        }
        sink.log(
            LogLevel::Debug,
            "using caller-supplied transport; its own timeout and certificate settings apply",
        );
        return Ok(handle.clone());
    }

    let headers = request.headers.as_ref().map(header_map).transpose()?;
    if headers.is_none() {
        sink.log(LogLevel::Debug, "no custom headers; using generated defaults");
    }
    let options = TransportOptions {
        timeout: request.timeout,
        ignore_ssl_errors: request.ignore_ssl_errors,
        headers,
    };
    if options.ignore_ssl_errors {
        sink.log(
            LogLevel::Warning,
            "certificate validation is disabled for this download",
        );
    }
    HttpTransport::build(&options).map(TransportHandle::owned)
}

/// Converts caller headers into a typed header map.
pub(crate) fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, DownloadError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| {
            DownloadError::transport_setup(format!("invalid header name '{name}'"), None)
        })?;
        let header_value = HeaderValue::from_str(value.trim()).map_err(|_| {
            DownloadError::transport_setup(format!("invalid value for header '{name}'"), None)
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn base_client_builder(options: &TransportOptions) -> ClientBuilder {
    let floor = current_floor();
    debug!(
        timeout_secs = options.timeout.as_secs(),
        ignore_ssl_errors = options.ignore_ssl_errors,
        ?floor,
        "building HTTP transport"
    );
    let headers = options
        .headers
        .clone()
        .unwrap_or_else(generate_default_headers);
    Client::builder()
        .connect_timeout(options.timeout)
        .read_timeout(options.timeout)
        .gzip(true)
        .deflate(true)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .min_tls_version(floor.to_reqwest())
        .danger_accept_invalid_certs(options.ignore_ssl_errors)
        .default_headers(headers)
}
