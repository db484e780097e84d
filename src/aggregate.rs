//! Fan-out of feed and item resolution into one unordered item stream.
//!
//! [`expand_feed`] resolves one feed and every item it references;
//! [`aggregate_feeds`] merges the expansions of the whole followed set.
//! Both produce items in arrival order — no ordering is guaranteed across
//! feeds, across items, or between the cached and network copies of a
//! single item. Failed resolutions are absorbed here: a failing identifier
//! contributes no item and never disturbs its siblings.

use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

use crate::config::EngineConfig;
use crate::resolve::{CacheStrategy, ResolveResource};
use crate::resource::{FeedSource, Item, ResourceDescription};

/// Resolve one feed and expand it into its items.
///
/// The feed identifier is resolved with `strategy`; every collection it
/// yields has its item references resolved concurrently with
/// [`CacheStrategy::for_items`]. Resolved descriptions that are themselves
/// collections never surface as items. Each surviving item carries the
/// collection's feed-level fields as its context.
///
/// The stream is lazy and finite: it completes once every resolution
/// scheduled for this call has completed.
pub fn expand_feed(
    resolver: Arc<dyn ResolveResource>,
    feed: FeedSource,
    strategy: CacheStrategy,
    item_limit: Option<usize>,
) -> BoxStream<'static, Item> {
    let item_strategy = strategy.for_items();

    resolver
        .resolve(feed.url(), strategy)
        .filter_map({
            let feed = feed.clone();
            move |result| {
                let collection = match result {
                    Ok(description) if description.is_collection() => Some(description),
                    Ok(description) => {
                        tracing::debug!(
                            feed = %feed,
                            kind = %description.kind,
                            "Feed resolved to a non-collection resource, skipping"
                        );
                        None
                    }
                    Err(err) => {
                        tracing::debug!(feed = %feed, error = %err, "Feed resolution failed");
                        None
                    }
                };
                future::ready(collection)
            }
        })
        .flat_map_unordered(item_limit, move |collection| {
            expand_collection(resolver.clone(), collection, item_strategy, item_limit)
        })
        .boxed()
}

/// Concurrently resolve every item a collection references.
fn expand_collection(
    resolver: Arc<dyn ResolveResource>,
    collection: ResourceDescription,
    strategy: CacheStrategy,
    item_limit: Option<usize>,
) -> BoxStream<'static, Item> {
    let references = collection.ordered_items.clone().unwrap_or_default();
    let context = Arc::new(collection.without_items());

    stream::iter(references)
        .flat_map_unordered(item_limit, move |reference| {
            let url = reference.url().to_string();
            let context = Arc::clone(&context);

            resolver
                .resolve(&url, strategy)
                .filter_map(move |result| {
                    let item = match result {
                        // Nested collections are not items.
                        Ok(description) if description.is_collection() => None,
                        Ok(description) => Some(Item {
                            resource: description,
                            context: Arc::clone(&context),
                        }),
                        Err(err) => {
                            tracing::debug!(item = %url, error = %err, "Item resolution failed");
                            None
                        }
                    };
                    future::ready(item)
                })
                .boxed()
        })
        .boxed()
}

/// Expand the whole followed set under one strategy, merging every feed's
/// items into a single interleaved stream.
pub fn aggregate_feeds(
    resolver: Arc<dyn ResolveResource>,
    feeds: Vec<FeedSource>,
    strategy: CacheStrategy,
    config: &EngineConfig,
) -> BoxStream<'static, Item> {
    let item_limit = config.item_limit();
    let feed_limit = config.feed_limit();

    stream::iter(feeds)
        .map(move |feed| expand_feed(resolver.clone(), feed, strategy, item_limit))
        .flatten_unordered(feed_limit)
        .boxed()
}
