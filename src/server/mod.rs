//! HTTP serving.
//!
//! [`RedirectServer`] runs the accept loop over whichever listener the
//! startup sequence produced and hands each connection to the
//! [`RedirectHandler`](crate::redirect::RedirectHandler). There are no
//! request timeouts and no admission control; concurrency is one Tokio task
//! per connection.

mod error;
mod http;

pub use error::{ServerError, ServerResult};
pub use http::{RedirectServer, bind, bind_first, wait_for_shutdown};
