//! Aggregates followed content feeds into a single, continuously
//! refreshed, deduplicated, time-ordered stream of items.
//!
//! The pipeline, bottom up:
//!
//! - [`resolve`] — the cache-strategy resolution contract
//!   ([`ResolveResource`]) plus an HTTP + LRU reference implementation
//! - [`aggregate`] — concurrent expansion of feeds into their items,
//!   merged across the whole followed set
//! - [`refresh`] — activation-driven refresh: stale-then-fresh first run,
//!   supersede-on-change cancellation, per-tick batching
//! - [`state`] — the pure reducer folding batches into the sorted
//!   aggregate state, behind a single-writer store
//! - [`engine`] — the [`FeedEngine`] facade wiring it all together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tributary::{EngineConfig, FeedEngine, HttpResolver};
//!
//! # async fn demo() -> Result<(), tributary::ResolveError> {
//! let config = EngineConfig::default();
//! let resolver = Arc::new(HttpResolver::new(&config.resolver)?);
//! let engine = FeedEngine::new(resolver, config);
//!
//! engine.set_following(vec!["https://example.com/feed".into()]);
//!
//! let mut states = engine.watch();
//! while states.changed().await.is_ok() {
//!     println!("{} items", states.borrow().items.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod refresh;
pub mod resolve;
pub mod resource;
pub mod state;

pub use config::{ConfigError, EngineConfig, ResolverConfig};
pub use engine::FeedEngine;
pub use resolve::{CacheStrategy, HttpResolver, ResolveError, ResolveResource, ResolveStream};
pub use resource::{FeedSource, Item, ItemRef, ResourceDescription, ORDERED_COLLECTION};
pub use state::{reduce, Action, AggregateState, Store, UpdateBatch};
