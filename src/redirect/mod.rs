//! Redirect handling.
//!
//! Every GET request is answered with `302 Found` to the configured target,
//! keeping the request path and query:
//!
//! ```text
//! target  = https://example.com/api
//! request = GET /v1/users?x=1
//! =>        302 Location: https://example.com/api/v1/users?x=1
//! ```
//!
//! Any other method gets `400 Bad Request` and no `Location` header.

mod handler;
mod response;

pub use handler::{METHOD_UNSUPPORTED_MESSAGE, RedirectDecision, RedirectHandler};
pub use response::{RedirectBody, bad_request, found};
