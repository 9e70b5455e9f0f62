//! `OrderedCollection` and `OrderedCollectionPage`.

use activitypub_federation::kinds::collection::{OrderedCollectionPageType, OrderedCollectionType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Default `ActivityStreams` JSON-LD context.
#[must_use]
pub fn activitystreams_context() -> Value {
    serde_json::json!([
        "https://www.w3.org/ns/activitystreams",
        "https://w3id.org/security/v1",
        {
            "manuallyApprovesFollowers": "as:manuallyApprovesFollowers",
            "sensitive": "as:sensitive",
            "Hashtag": "as:Hashtag",
            "toot": "http://joinmastodon.org/ns#",
            "discoverable": "toot:discoverable"
        }
    ])
}

/// `ActivityPub` `OrderedCollection`.
///
/// Either lists every item (followers, following) or only links to its
/// first and last pages (outbox).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollection {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(rename = "type")]
    pub kind: OrderedCollectionType,
    pub id: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered_items: Option<Vec<Value>>,
}

impl OrderedCollection {
    /// A collection carrying all of its items.
    #[must_use]
    pub fn with_items(id: Url, items: Vec<Value>) -> Self {
        Self {
            context: Some(activitystreams_context()),
            kind: OrderedCollectionType::OrderedCollection,
            id,
            total_items: Some(items.len() as u64),
            first: None,
            last: None,
            ordered_items: Some(items),
        }
    }

    /// A collection that only points at its pages.
    #[must_use]
    pub fn paged(id: Url, first: Url, last: Url) -> Self {
        Self {
            context: Some(activitystreams_context()),
            kind: OrderedCollectionType::OrderedCollection,
            id,
            total_items: None,
            first: Some(first),
            last: Some(last),
            ordered_items: None,
        }
    }

    /// Items as strings, skipping anything that is not an IRI.
    #[must_use]
    pub fn item_iris(&self) -> Vec<String> {
        self.ordered_items
            .iter()
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// `ActivityPub` `OrderedCollectionPage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollectionPage {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(rename = "type")]
    pub kind: OrderedCollectionPageType,
    pub id: Url,
    pub part_of: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Url>,
    pub ordered_items: Vec<Value>,
}

impl OrderedCollectionPage {
    #[must_use]
    pub fn new(id: Url, part_of: Url, ordered_items: Vec<Value>) -> Self {
        Self {
            context: Some(activitystreams_context()),
            kind: OrderedCollectionPageType::OrderedCollectionPage,
            id,
            part_of,
            prev: None,
            next: None,
            ordered_items,
        }
    }
}
