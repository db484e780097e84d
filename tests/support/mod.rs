//! Shared test support: a scripted in-memory resolver and resource builders.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tributary::{
    CacheStrategy, ResolveError, ResolveResource, ResolveStream, ResourceDescription,
};

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
struct Step {
    delay: Duration,
    result: Result<ResourceDescription, String>,
}

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<(String, CacheStrategy), Vec<Step>>>,
    calls: Mutex<Vec<(String, CacheStrategy)>>,
}

/// Resolver whose responses are scripted per (identifier, strategy) pair.
///
/// Unscripted pairs yield an empty stream, which conveniently models a
/// `CacheFirst` miss. Every resolve call is recorded for later assertions.
#[derive(Clone, Default)]
pub struct MockResolver {
    inner: Arc<Inner>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script immediate values for one (identifier, strategy) pair,
    /// replacing any previous script for it.
    pub fn respond(
        &self,
        identifier: &str,
        strategy: CacheStrategy,
        values: Vec<ResourceDescription>,
    ) {
        self.respond_after(identifier, strategy, Duration::ZERO, values);
    }

    /// Script values whose first arrival is delayed.
    pub fn respond_after(
        &self,
        identifier: &str,
        strategy: CacheStrategy,
        delay: Duration,
        values: Vec<ResourceDescription>,
    ) {
        let steps = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Step {
                delay: if i == 0 { delay } else { Duration::ZERO },
                result: Ok(value),
            })
            .collect();
        self.insert(identifier, strategy, steps);
    }

    /// Script a failure for one (identifier, strategy) pair.
    pub fn fail(&self, identifier: &str, strategy: CacheStrategy) {
        self.insert(
            identifier,
            strategy,
            vec![Step {
                delay: Duration::ZERO,
                result: Err(format!("scripted failure for {identifier}")),
            }],
        );
    }

    fn insert(&self, identifier: &str, strategy: CacheStrategy, steps: Vec<Step>) {
        self.inner
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((identifier.to_string(), strategy), steps);
    }

    /// Every resolve call observed so far, in call order.
    pub fn calls(&self) -> Vec<(String, CacheStrategy)> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The strategies this identifier was resolved with, in call order.
    pub fn strategies_for(&self, identifier: &str) -> Vec<CacheStrategy> {
        self.calls()
            .into_iter()
            .filter(|(id, _)| id == identifier)
            .map(|(_, strategy)| strategy)
            .collect()
    }
}

impl ResolveResource for MockResolver {
    fn resolve(&self, identifier: &str, strategy: CacheStrategy) -> ResolveStream {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((identifier.to_string(), strategy));

        let steps = self
            .inner
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(identifier.to_string(), strategy))
            .cloned()
            .unwrap_or_default();

        stream::iter(steps)
            .then(|step| async move {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                step.result.map_err(ResolveError::Malformed)
            })
            .boxed()
    }
}

/// A collection description listing item references by URL.
pub fn collection(url: &str, name: &str, item_urls: &[&str]) -> ResourceDescription {
    serde_json::from_value(serde_json::json!({
        "type": "OrderedCollection",
        "url": url,
        "name": name,
        "orderedItems": item_urls,
    }))
    .unwrap()
}

/// A leaf article description.
pub fn article(url: &str, name: &str, published: Option<&str>) -> ResourceDescription {
    serde_json::from_value(serde_json::json!({
        "type": "Article",
        "url": url,
        "name": name,
        "published": published,
    }))
    .unwrap()
}
