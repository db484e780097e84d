//! Normalized resource descriptions and the items derived from them.
//!
//! A feed and the things it links to are both "resources": one identifier
//! resolves to one [`ResourceDescription`]. A description is either a
//! collection (it carries `orderedItems`) or a leaf. Leaves discovered
//! through a collection become [`Item`]s, each carrying the feed-level
//! fields of the collection it was found in as its `context`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `type` value that marks a resource as a collection of items.
pub const ORDERED_COLLECTION: &str = "OrderedCollection";

/// One followed feed, identified by its URL.
///
/// Cheap to clone (`Arc<str>` inner); the followed set is passed around
/// as a `Vec<FeedSource>` and snapshotted per refresh activation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedSource(Arc<str>);

impl FeedSource {
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self(url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeedSource {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for FeedSource {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// A reference to an item inside a collection's `orderedItems`.
///
/// Publishers emit either a bare URL string or an object with a `url`
/// field; both deserialize to the same thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemRef {
    Url(String),
    Object { url: String },
}

impl ItemRef {
    pub fn url(&self) -> &str {
        match self {
            ItemRef::Url(url) => url,
            ItemRef::Object { url } => url,
        }
    }
}

/// The normalized description a resolver produces for one identifier.
///
/// `kind` (the wire-level `type`) and `url` are required; everything else
/// is optional metadata. A description with `kind == "OrderedCollection"`
/// is a collection and its `ordered_items` lists the item references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescription {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributed_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered_items: Option<Vec<ItemRef>>,
}

impl ResourceDescription {
    pub fn is_collection(&self) -> bool {
        self.kind == ORDERED_COLLECTION
    }

    /// The feed-level fields of a collection: everything except the item
    /// list. Attached to every item discovered through the collection.
    pub fn without_items(&self) -> ResourceDescription {
        ResourceDescription {
            ordered_items: None,
            ..self.clone()
        }
    }

    /// Publish instant used for ordering: `published`, falling back to
    /// `updated`, falling back to the Unix epoch so every resource is
    /// comparable.
    pub fn effective_published(&self) -> DateTime<Utc> {
        self.published
            .or(self.updated)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// A leaf resource discovered through a feed, tagged with that feed's
/// description (minus its item list) as context.
///
/// Identity is the resource URL: two items with the same URL are the same
/// item, and the most recently merged one wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub resource: ResourceDescription,
    pub context: Arc<ResourceDescription>,
}

impl Item {
    pub fn url(&self) -> &str {
        &self.resource.url
    }

    pub fn effective_published(&self) -> DateTime<Utc> {
        self.resource.effective_published()
    }
}
