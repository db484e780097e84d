//! HTTP-backed resolver with an in-memory cache tier.
//!
//! Fetches resources published as normalized JSON descriptions and keeps
//! every successful fetch in an LRU cache so the cache strategies have
//! something to serve. The cache is keyed by the identifier string as
//! given; both collections and leaf items are cached.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future;
use futures::stream::{self, StreamExt};
use lru::LruCache;
use reqwest::header::ACCEPT;
use url::Url;

use super::{CacheStrategy, ResolveError, ResolveResource, ResolveStream};
use crate::config::ResolverConfig;
use crate::resource::ResourceDescription;

const JSON_ACCEPT: &str = "application/activity+json, application/json";

/// Resolver backed by `reqwest` and an LRU cache of previously fetched
/// descriptions.
///
/// Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    cache: Arc<Mutex<LruCache<String, ResourceDescription>>>,
    max_body_bytes: usize,
}

impl HttpResolver {
    /// Build a resolver from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] if the HTTP client cannot be
    /// constructed (malformed user agent, TLS backend failure).
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()
            .map_err(ResolveError::Client)?;

        let capacity =
            NonZeroUsize::new(config.cache_entries).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            client,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn cached(&self, identifier: &str) -> Option<ResourceDescription> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(identifier).cloned()
    }

    fn store(&self, identifier: &str, description: &ResourceDescription) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(identifier.to_string(), description.clone());
    }

    /// Fetch the identifier from the network, parse the body as a resource
    /// description, and cache the result.
    async fn fetch_fresh(
        &self,
        identifier: &str,
    ) -> Result<ResourceDescription, ResolveError> {
        let url = Url::parse(identifier)
            .map_err(|e| ResolveError::InvalidIdentifier(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, JSON_ACCEPT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResolveError::Timeout
                } else {
                    ResolveError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, self.max_body_bytes).await?;

        let description: ResourceDescription = serde_json::from_slice(&bytes)
            .map_err(|e| ResolveError::Malformed(e.to_string()))?;

        tracing::debug!(
            identifier = identifier,
            kind = %description.kind,
            bytes = bytes.len(),
            "Fetched resource"
        );

        self.store(identifier, &description);
        Ok(description)
    }
}

impl ResolveResource for HttpResolver {
    fn resolve(&self, identifier: &str, strategy: CacheStrategy) -> ResolveStream {
        let this = self.clone();
        let identifier = identifier.to_string();

        match strategy {
            CacheStrategy::CacheFirst => {
                // Cache hit or nothing; the network is never consulted.
                stream::once(async move { this.cached(&identifier) })
                    .filter_map(|hit| future::ready(hit.map(Ok)))
                    .boxed()
            }
            CacheStrategy::Revalidate => {
                let cached = stream::once({
                    let this = this.clone();
                    let identifier = identifier.clone();
                    async move { this.cached(&identifier) }
                })
                .filter_map(|hit| future::ready(hit.map(Ok)));

                let fresh =
                    stream::once(async move { this.fetch_fresh(&identifier).await });

                cached.chain(fresh).boxed()
            }
            CacheStrategy::NetworkFirst => stream::once(async move {
                match this.fetch_fresh(&identifier).await {
                    Ok(description) => Ok(description),
                    Err(err) => match this.cached(&identifier) {
                        Some(description) => {
                            tracing::debug!(
                                identifier = %identifier,
                                error = %err,
                                "Network fetch failed, serving cached copy"
                            );
                            Ok(description)
                        }
                        None => Err(err),
                    },
                }
            })
            .boxed(),
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ResolveError> {
    // Capture Content-Length for the completeness check below.
    let expected_length = response.content_length();

    // Fast path: reject on the Content-Length header alone.
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(ResolveError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(ResolveError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ResolveError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // A short body means the connection dropped mid-transfer.
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(ResolveError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
