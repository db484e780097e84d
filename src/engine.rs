//! Ties the refresh controller and the state store into one owned object.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::refresh;
use crate::resolve::ResolveResource;
use crate::resource::FeedSource;
use crate::state::{Action, AggregateState, Store};

/// The aggregation engine: feed the followed set in, observe sorted state
/// snapshots out.
///
/// Dropping the engine tears down the controller, the batch pump, and the
/// state actor.
pub struct FeedEngine {
    following: watch::Sender<Vec<FeedSource>>,
    store: Store,
}

impl FeedEngine {
    /// Start the engine against a resolver. Must be called within a tokio
    /// runtime.
    pub fn new(resolver: Arc<dyn ResolveResource>, config: EngineConfig) -> Self {
        let (following, following_rx) = watch::channel(Vec::new());
        let store = Store::spawn();

        let mut batches = refresh::subscribe(resolver, config, following_rx);
        let pump = store.clone();
        tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                pump.dispatch(Action::Merge(batch));
            }
        });

        Self { following, store }
    }

    /// Replace the followed-feed set.
    ///
    /// A changed set supersedes any refresh still running for the previous
    /// set; an unchanged set is a no-op rather than a re-activation.
    pub fn set_following(&self, feeds: Vec<FeedSource>) {
        self.following.send_if_modified(|current| {
            if *current == feeds {
                false
            } else {
                *current = feeds;
                true
            }
        });
    }

    /// Clear the aggregate state back to empty.
    pub fn reset(&self) {
        self.store.dispatch(Action::Reset);
    }

    /// Watch state snapshots as batches are merged.
    pub fn watch(&self) -> watch::Receiver<AggregateState> {
        self.store.watch()
    }

    /// The current state snapshot.
    pub fn state(&self) -> AggregateState {
        self.store.state()
    }
}
