//! `ActivityPub` Note object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// The special audience meaning "everyone".
pub const PUBLIC_AUDIENCE: &str = "https://www.w3.org/ns/activitystreams#Public";

/// Object types treated as statuses.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ApObjectType {
    Note,
    Article,
    Page,
}

/// `ActivityPub` Note object.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApNote {
    #[serde(rename = "type")]
    pub kind: ApObjectType,
    pub id: Url,
    pub attributed_to: Url,
    #[serde(default)]
    pub content: String,
    pub published: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<Url>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Url>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Url>,

    /// Content warning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default)]
    pub sensitive: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<ApTag>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachment: Vec<ApAttachment>,
}

/// `ActivityPub` tag (mention or hashtag).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApTag {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ApTag {
    #[must_use]
    pub fn mention(href: Url, name: String) -> Self {
        Self {
            kind: "Mention".to_string(),
            href: Some(href),
            name: Some(name),
        }
    }

    #[must_use]
    pub fn hashtag(href: Option<Url>, tag: &str) -> Self {
        Self {
            kind: "Hashtag".to_string(),
            href,
            name: Some(format!("#{tag}")),
        }
    }

    #[must_use]
    pub fn is_mention(&self) -> bool {
        self.kind == "Mention"
    }
}

/// `ActivityPub` attachment (file).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ApNote {
    /// A note with no addressing, tags or attachments.
    #[must_use]
    pub const fn new(id: Url, attributed_to: Url, content: String, published: DateTime<Utc>) -> Self {
        Self {
            kind: ApObjectType::Note,
            id,
            attributed_to,
            content,
            published,
            to: Vec::new(),
            cc: Vec::new(),
            url: None,
            in_reply_to: None,
            summary: None,
            sensitive: false,
            tag: Vec::new(),
            attachment: Vec::new(),
        }
    }

    /// Whether the note is addressed to the public collection, in `to` or `cc`.
    #[must_use]
    pub fn is_addressed_to_public(&self) -> bool {
        self.to
            .iter()
            .chain(&self.cc)
            .any(|u| u.as_str() == PUBLIC_AUDIENCE)
    }

    /// Whether the note is addressed to the public collection in `to`.
    #[must_use]
    pub fn is_public_to(&self) -> bool {
        self.to.iter().any(|u| u.as_str() == PUBLIC_AUDIENCE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{path}")).unwrap()
    }

    #[test]
    fn test_note_serialization() {
        let note = ApNote::new(
            test_url("/users/alice/statuses/123"),
            test_url("/users/alice"),
            "<p>Hello, world!</p>".to_string(),
            Utc::now(),
        );

        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"type\":\"Note\""));
        assert!(json.contains("\"attributedTo\":\"https://example.com/users/alice\""));
        assert!(!json.contains("\"to\""));
    }

    #[test]
    fn test_note_addressing() {
        let json = r#"{
            "type": "Note",
            "id": "https://remote.example/notes/1",
            "attributedTo": "https://remote.example/users/bob",
            "content": "hi",
            "published": "2025-01-01T00:00:00Z",
            "to": ["https://remote.example/users/bob/followers"],
            "cc": ["https://www.w3.org/ns/activitystreams#Public"]
        }"#;

        let note: ApNote = serde_json::from_str(json).unwrap();
        assert!(note.is_addressed_to_public());
        assert!(!note.is_public_to());
        assert!(note.tag.is_empty());
    }
}
