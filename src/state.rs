//! The aggregate item state and the pure reducer that folds batches into it.
//!
//! [`reduce`] is a pure function over [`Action`]s; [`Store`] wraps it in a
//! single-writer actor so concurrently produced batches are applied one at
//! a time, in arrival order, and consumers observe consistent snapshots.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use crate::resource::Item;

// ============================================================================
// Update Batches
// ============================================================================

/// One scheduling tick's worth of resolved items, deduplicated by URL.
///
/// Never empty: construction from zero arrivals yields `None` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateBatch {
    items: Vec<Item>,
}

impl UpdateBatch {
    /// Build a batch from the items that arrived within one tick.
    ///
    /// Duplicate URLs within the tick (e.g. an item's cached copy and its
    /// network copy landing together) collapse to a single entry holding
    /// the last arrival's payload at the first arrival's position. Returns
    /// `None` for an empty tick.
    pub fn from_arrivals(arrivals: Vec<Item>) -> Option<Self> {
        if arrivals.is_empty() {
            return None;
        }

        let mut positions: HashMap<String, usize> = HashMap::with_capacity(arrivals.len());
        let mut items: Vec<Item> = Vec::with_capacity(arrivals.len());

        for item in arrivals {
            match positions.entry(item.url().to_string()) {
                Entry::Occupied(slot) => items[*slot.get()] = item,
                Entry::Vacant(slot) => {
                    slot.insert(items.len());
                    items.push(item);
                }
            }
        }

        Some(Self { items })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Actions & State
// ============================================================================

/// Input to [`reduce`].
///
/// The closed enum is the whole contract: there is no "unknown action"
/// case to fail on at runtime.
#[derive(Debug, Clone)]
pub enum Action {
    /// Merge a batch of new/updated items into the state.
    Merge(UpdateBatch),
    /// Clear the state back to empty (sign-out, followed set emptied).
    Reset,
}

/// The authoritative, sorted item collection exposed to consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateState {
    pub items: Vec<Item>,
}

impl AggregateState {
    /// Items whose effective publish time is strictly before `instant`.
    ///
    /// Lets a consumer hide items scheduled in the future; re-evaluating
    /// when they come due is the caller's concern.
    pub fn published_before(
        &self,
        instant: DateTime<Utc>,
    ) -> impl Iterator<Item = &Item> {
        self.items
            .iter()
            .filter(move |item| item.effective_published() < instant)
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Fold one action into the state, returning the new state.
///
/// Merging is last-merged-wins by item URL — an incoming item replaces an
/// existing one with the same URL regardless of their timestamps — followed
/// by a stable descending sort on effective publish time, so ties keep
/// their relative merge order.
pub fn reduce(state: &AggregateState, action: &Action) -> AggregateState {
    match action {
        Action::Merge(batch) => {
            let mut positions: HashMap<String, usize> =
                HashMap::with_capacity(state.items.len() + batch.len());
            let mut items: Vec<Item> =
                Vec::with_capacity(state.items.len() + batch.len());

            for item in state.items.iter().chain(batch.items()).cloned() {
                match positions.entry(item.url().to_string()) {
                    Entry::Occupied(slot) => items[*slot.get()] = item,
                    Entry::Vacant(slot) => {
                        slot.insert(items.len());
                        items.push(item);
                    }
                }
            }

            items.sort_by_key(|item| Reverse(item.effective_published()));

            AggregateState { items }
        }
        Action::Reset => AggregateState::default(),
    }
}

// ============================================================================
// Store
// ============================================================================

/// Single-writer owner of an [`AggregateState`].
///
/// A spawned actor holds the state, applies dispatched actions strictly in
/// arrival order, and publishes each new snapshot through a watch channel.
/// Cloning shares the same actor.
#[derive(Clone)]
pub struct Store {
    actions: mpsc::UnboundedSender<Action>,
    state: watch::Receiver<AggregateState>,
}

impl Store {
    /// Spawn the state-owning actor. Must be called within a tokio runtime.
    pub fn spawn() -> Self {
        let (actions, mut action_rx) = mpsc::unbounded_channel::<Action>();
        let (state_tx, state) = watch::channel(AggregateState::default());

        tokio::spawn(async move {
            let mut current = AggregateState::default();
            while let Some(action) = action_rx.recv().await {
                current = reduce(&current, &action);
                state_tx.send_replace(current.clone());
            }
        });

        Self { actions, state }
    }

    /// Queue an action for the actor. Actions are applied in dispatch order.
    pub fn dispatch(&self, action: Action) {
        if self.actions.send(action).is_err() {
            tracing::debug!("State store actor is gone, dropping action");
        }
    }

    /// Watch state snapshots. The receiver starts at the current snapshot.
    pub fn watch(&self) -> watch::Receiver<AggregateState> {
        self.state.clone()
    }

    /// The current snapshot.
    pub fn state(&self) -> AggregateState {
        self.state.borrow().clone()
    }
}
