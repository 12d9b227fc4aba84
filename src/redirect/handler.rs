//! Redirect decision logic.
//!
//! The handler owns the target URL and maps each request to a
//! [`RedirectDecision`]. It holds no per-request state, so a single
//! instance is shared by every connection.
//!
//! # Location format
//!
//! ```text
//! {target scheme}://{target host[:port]}{target path, ending in '/'}{request path without leading '/'}[?{request query}]
//! ```
//!
//! The request path is appended verbatim: no decoding, no normalization of
//! `.` or `..` segments, no collapsing of repeated slashes.

use hyper::{Method, Request, Response, Uri};
use tracing::debug;
use url::Url;

use super::response::{RedirectBody, bad_request, found};

/// Body of the response sent for non-GET requests.
pub const METHOD_UNSUPPORTED_MESSAGE: &str = "HTTP Method Unsupported";

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Answer with `302 Found` pointing at this location.
    Redirect(String),
    /// Answer with `400 Bad Request`; only GET is redirected.
    MethodNotAllowed,
}

/// Redirects requests to a fixed target, preserving path and query.
#[derive(Debug, Clone)]
pub struct RedirectHandler {
    target: Url,
}

impl RedirectHandler {
    /// Create a handler for the given target.
    pub fn new(target: Url) -> Self {
        Self { target }
    }

    /// Decide how to answer a request.
    pub fn decide(&self, method: &Method, uri: &Uri) -> RedirectDecision {
        if method != Method::GET {
            return RedirectDecision::MethodNotAllowed;
        }
        RedirectDecision::Redirect(self.location_for(uri))
    }

    /// Build the redirect location for a request URI.
    pub fn location_for(&self, uri: &Uri) -> String {
        let mut location = String::with_capacity(self.target.as_str().len() + uri.path().len());

        location.push_str(self.target.scheme());
        location.push_str("://");
        location.push_str(self.target.host_str().unwrap_or_default());
        if let Some(port) = self.target.port() {
            location.push(':');
            location.push_str(&port.to_string());
        }

        let base = self.target.path();
        location.push_str(base);
        if !base.ends_with('/') {
            location.push('/');
        }

        // A path that doesn't start with '/' only shows up for malformed or
        // asterisk-form requests; append it whole.
        let path = uri.path();
        location.push_str(path.strip_prefix('/').unwrap_or(path));

        if let Some(query) = uri.query() {
            location.push('?');
            location.push_str(query);
        }

        location
    }

    /// Produce the HTTP response for a request.
    pub fn respond<B>(&self, req: &Request<B>) -> Response<RedirectBody> {
        match self.decide(req.method(), req.uri()) {
            RedirectDecision::Redirect(location) => {
                debug!(method = %req.method(), uri = %req.uri(), %location, "Redirecting");
                found(&location)
            }
            RedirectDecision::MethodNotAllowed => {
                debug!(method = %req.method(), uri = %req.uri(), "Rejecting unsupported method");
                bad_request(METHOD_UNSUPPORTED_MESSAGE)
            }
        }
    }
}
