//! `ActivityPub` activities exchanged through inboxes.
//!
//! One envelope type covers every supported activity; the object is kept as
//! JSON since it may be an embedded object or a bare IRI.

use chrono::{DateTime, Utc};
use plaza_queue::ActivityType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::objects::activitystreams_context;

/// An activity envelope.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub id: Url,
    pub actor: Url,
    pub object: Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<Url>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Url>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    /// Free text, e.g. the comment of a forwarded report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Activity {
    /// A new outgoing activity with the default JSON-LD context.
    #[must_use]
    pub fn new(kind: ActivityType, id: Url, actor: Url, object: impl Into<Value>) -> Self {
        Self {
            context: Some(activitystreams_context()),
            kind,
            id,
            actor,
            object: object.into(),
            to: Vec::new(),
            cc: Vec::new(),
            published: None,
            content: None,
        }
    }

    /// Set the addressing.
    #[must_use]
    pub fn addressed(mut self, to: Vec<Url>, cc: Vec<Url>) -> Self {
        self.to = to;
        self.cc = cc;
        self
    }

    #[must_use]
    pub const fn published_at(mut self, published: DateTime<Utc>) -> Self {
        self.published = Some(published);
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// ID of the object, whether embedded or referenced.
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        match &self.object {
            Value::String(iri) => Some(iri),
            Value::Object(map) => map.get("id").and_then(Value::as_str),
            _ => None,
        }
    }

    /// `type` of an embedded object.
    #[must_use]
    pub fn object_type(&self) -> Option<&str> {
        self.object.get("type").and_then(Value::as_str)
    }

    /// The embedded object's `object`, e.g. the followee of an undone Follow.
    #[must_use]
    pub fn inner_object_id(&self) -> Option<&str> {
        match self.object.get("object")? {
            Value::String(iri) => Some(iri),
            inner => inner.get("id").and_then(Value::as_str),
        }
    }

    /// Serialize for delivery.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_serialization() {
        let activity = Activity::new(
            ActivityType::Follow,
            Url::parse("https://plaza.example/users/a/follow/1").unwrap(),
            Url::parse("https://plaza.example/users/a").unwrap(),
            "https://remote.example/users/b",
        );

        let json = activity.to_json().unwrap();
        assert_eq!(json["type"], "Follow");
        assert_eq!(json["object"], "https://remote.example/users/b");
        assert!(json.get("to").is_none());
        assert_eq!(activity.object_id(), Some("https://remote.example/users/b"));
    }

    #[test]
    fn test_undo_follow_parsing() {
        let json = r#"{
            "type": "Undo",
            "id": "https://remote.example/undo/1",
            "actor": "https://remote.example/users/b",
            "object": {
                "type": "Follow",
                "id": "https://remote.example/follow/1",
                "actor": "https://remote.example/users/b",
                "object": "https://plaza.example/users/a"
            }
        }"#;

        let activity: Activity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.kind, ActivityType::Undo);
        assert_eq!(activity.object_type(), Some("Follow"));
        assert_eq!(activity.object_id(), Some("https://remote.example/follow/1"));
        assert_eq!(
            activity.inner_object_id(),
            Some("https://plaza.example/users/a")
        );
    }

    #[test]
    fn test_unknown_activity_is_rejected() {
        let json = r#"{
            "type": "EmojiReact",
            "id": "https://remote.example/r/1",
            "actor": "https://remote.example/users/b",
            "object": "https://plaza.example/users/a/statuses/1"
        }"#;
        assert!(serde_json::from_str::<Activity>(json).is_err());
    }
}
