//! The incremental refresh controller.
//!
//! Drives the aggregation stream across *activations* — one activation per
//! observed value of the followed-feed set. The first non-empty activation
//! serves cached copies before revalidating; later ones go straight to
//! revalidation. A newly observed value supersedes the previous activation
//! by dropping its in-flight work. Arrivals are grouped into deduplicated
//! [`UpdateBatch`]es per scheduling tick.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::aggregate::aggregate_feeds;
use crate::config::EngineConfig;
use crate::resolve::{CacheStrategy, ResolveResource};
use crate::resource::{FeedSource, Item};
use crate::state::UpdateBatch;

/// The batch consumer disappeared; refresh work has nowhere to go.
struct SubscriberClosed;

/// Subscribe to update batches for a changing followed-feed set.
///
/// Spawns the controller task and returns the receiving end of its batch
/// queue. The task runs until either the `following` sender or the
/// returned receiver is dropped.
///
/// # Behavior
///
/// - An empty followed set starts no work and produces no batches.
/// - The first non-empty set runs a cache-only pass and, only once that
///   pass is exhausted, a revalidation pass feeding the same batch queue.
/// - Every later non-empty set runs a revalidation pass only.
/// - Any newly observed set (empty included) cancels the in-flight
///   activation immediately; batches already queued are not retracted.
pub fn subscribe(
    resolver: Arc<dyn ResolveResource>,
    config: EngineConfig,
    following: watch::Receiver<Vec<FeedSource>>,
) -> mpsc::Receiver<UpdateBatch> {
    let (batch_tx, batch_rx) = mpsc::channel(config.batch_queue.max(1));
    tokio::spawn(run(resolver, config, following, batch_tx));
    batch_rx
}

async fn run(
    resolver: Arc<dyn ResolveResource>,
    config: EngineConfig,
    mut following: watch::Receiver<Vec<FeedSource>>,
    batch_tx: mpsc::Sender<UpdateBatch>,
) {
    // Counts non-empty activations; the two-phase protocol applies to the
    // very first one only.
    let mut activations: u64 = 0;

    loop {
        let feeds = following.borrow_and_update().clone();

        if feeds.is_empty() {
            if following.changed().await.is_err() {
                return;
            }
            continue;
        }

        let first = activations == 0;
        activations += 1;
        tracing::info!(
            feeds = feeds.len(),
            first_activation = first,
            "Starting refresh activation"
        );

        tokio::select! {
            changed = following.changed() => {
                // Dropping the activation future abandons all of its
                // in-flight resolver calls.
                if changed.is_err() {
                    return;
                }
                tracing::debug!("Followed set changed, superseding in-flight refresh");
            }
            outcome = activate(resolver.clone(), &config, feeds, first, &batch_tx) => {
                match outcome {
                    Err(SubscriberClosed) => return,
                    Ok(()) => {
                        tracing::debug!("Refresh activation complete");
                        if following.changed().await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Run one activation's phase(s) into the batch queue.
async fn activate(
    resolver: Arc<dyn ResolveResource>,
    config: &EngineConfig,
    feeds: Vec<FeedSource>,
    first: bool,
    batch_tx: &mpsc::Sender<UpdateBatch>,
) -> Result<(), SubscriberClosed> {
    let items: BoxStream<'static, Item> = if first {
        // Serve whatever the cache has before touching the network; the
        // revalidation pass must not start emitting until the cache pass
        // is exhausted.
        let warm = aggregate_feeds(
            resolver.clone(),
            feeds.clone(),
            CacheStrategy::CacheFirst,
            config,
        );
        let fresh = aggregate_feeds(resolver, feeds, CacheStrategy::Revalidate, config);
        warm.chain(fresh).boxed()
    } else {
        aggregate_feeds(resolver, feeds, CacheStrategy::Revalidate, config)
    };

    emit_batches(items, config.batch_window(), batch_tx).await
}

/// Group arrivals into per-tick batches and send them downstream.
///
/// A batch opens on the first arrival and closes once the window elapses
/// (with a zero window: as soon as nothing more is immediately ready in
/// this scheduling turn). Ticks with nothing in them produce nothing.
async fn emit_batches(
    items: BoxStream<'static, Item>,
    window: Duration,
    batch_tx: &mpsc::Sender<UpdateBatch>,
) -> Result<(), SubscriberClosed> {
    let mut items = items.fuse();

    while let Some(head) = items.next().await {
        let mut arrivals = vec![head];
        let mut ended = false;

        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                // Drain everything already available before consulting the
                // deadline, so a zero window still captures the whole tick.
                biased;
                next = items.next() => match next {
                    Some(item) => arrivals.push(item),
                    None => {
                        ended = true;
                        break;
                    }
                },
                () = &mut deadline => break,
            }
        }

        if let Some(update) = UpdateBatch::from_arrivals(arrivals) {
            tracing::debug!(items = update.len(), "Emitting update batch");
            if batch_tx.send(update).await.is_err() {
                tracing::warn!("Update subscriber dropped, stopping refresh");
                return Err(SubscriberClosed);
            }
        }

        if ended {
            break;
        }
    }

    Ok(())
}
