//! The HTTP seam between [`Recipients`](crate::Recipients) and the network.

use serde::Serialize;
use std::future::Future;

use crate::HttpOutcome;

/// Base path of the recipients endpoints.
pub const RECIPIENTS_PATH: &str = "/v3/contactdb/recipients";

/// Path of the recipients search endpoint for an already-encoded query.
pub fn search_path(query: &str) -> String {
    format!("{RECIPIENTS_PATH}/search?{query}")
}

/// Sends one request and reports what came back.
///
/// Implementations own everything about the wire: base URL, authentication,
/// timeouts, retries. A response whose body decodes as JSON must be returned
/// as [`HttpOutcome::Success`] whatever its status code, because the vendor
/// reports validation problems in the body. Anything else is an
/// [`HttpOutcome::Failure`].
///
/// [`Client`](crate::Client) is the stock implementation. Tests can supply
/// their own to replay canned bodies.
pub trait HttpClient: Send + Sync {
    /// Sends `body` as JSON with `POST`.
    fn post<B>(&self, path: &str, body: &B) -> impl Future<Output = HttpOutcome> + Send
    where
        B: Serialize + Sync + ?Sized;

    /// Sends `body` as JSON with `PATCH`.
    fn patch<B>(&self, path: &str, body: &B) -> impl Future<Output = HttpOutcome> + Send
    where
        B: Serialize + Sync + ?Sized;

    /// Sends a `GET`. `path` may carry a query string.
    fn get(&self, path: &str) -> impl Future<Output = HttpOutcome> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_path() {
        assert_eq!(
            search_path("email=a%40b.com"),
            "/v3/contactdb/recipients/search?email=a%40b.com"
        );
    }
}
