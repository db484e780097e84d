//! Resource resolution: the cache-strategy contract and its HTTP backend.
//!
//! The engine never fetches anything itself — it asks a [`ResolveResource`]
//! implementation for each identifier it encounters. One call may yield
//! zero, one, or two descriptions over time (a cached copy, then a fresher
//! network copy), which is why the contract is a stream rather than a
//! single future.

mod http;

pub use http::HttpResolver;

use futures::stream::BoxStream;
use thiserror::Error;

use crate::resource::ResourceDescription;

/// Policy controlling whether a resolve call is served from cache, the
/// network, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStrategy {
    /// Serve a cached copy if one exists. Never touches the network, so a
    /// cache miss yields nothing.
    CacheFirst,
    /// Serve a cached copy if one exists, then always fetch from the
    /// network and emit the (possibly updated) result as well.
    Revalidate,
    /// Fetch from the network; fall back to a cached copy only if the
    /// fetch fails.
    NetworkFirst,
}

impl CacheStrategy {
    /// Strategy used to resolve the items of a feed resolved with `self`.
    ///
    /// A `Revalidate` feed pass resolves its items with `NetworkFirst`:
    /// the feed's cached copy was already served in the cache pass, and
    /// serving stale item bodies a second time would defeat the
    /// revalidation.
    pub fn for_items(self) -> CacheStrategy {
        match self {
            CacheStrategy::Revalidate => CacheStrategy::NetworkFirst,
            other => other,
        }
    }
}

/// Failure of a single resolve call.
///
/// These never escape the expansion stage: a failed identifier simply
/// contributes no item to the pass (see [`crate::aggregate`]).
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Identifier is not a fetchable URL
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// Body was not a usable resource description (bad JSON, missing
    /// required fields)
    #[error("Malformed resource description: {0}")]
    Malformed(String),
    /// HTTP client construction failed
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

/// The lazy sequence of descriptions produced by one resolve call.
pub type ResolveStream = BoxStream<'static, Result<ResourceDescription, ResolveError>>;

/// Resolves one identifier under a cache strategy.
///
/// # Contract
///
/// - The returned stream must not begin any work until first polled.
/// - It yields zero, one, or two values and then completes; a second
///   value supersedes the first (cached copy, then network copy).
/// - A failure is reported as an `Err` element; it must only affect this
///   call, never sibling calls.
/// - Dropping the stream abandons the call; implementations must not
///   require it to be driven to completion.
pub trait ResolveResource: Send + Sync {
    fn resolve(&self, identifier: &str, strategy: CacheStrategy) -> ResolveStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revalidate_feeds_resolve_items_network_first() {
        assert_eq!(
            CacheStrategy::Revalidate.for_items(),
            CacheStrategy::NetworkFirst
        );
    }

    #[test]
    fn test_other_strategies_pass_through_to_items() {
        assert_eq!(
            CacheStrategy::CacheFirst.for_items(),
            CacheStrategy::CacheFirst
        );
        assert_eq!(
            CacheStrategy::NetworkFirst.for_items(),
            CacheStrategy::NetworkFirst
        );
    }
}
