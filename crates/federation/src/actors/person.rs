//! `ActivityPub` actor document.

use serde::{Deserialize, Serialize};
use url::Url;

/// Actor types accepted from remote servers. Local accounts are `Person`,
/// or `Service` when flagged as bots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ApActorType {
    Person,
    Service,
    Application,
    Group,
    Organization,
}

/// `ActivityPub` actor.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApPerson {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: ApActorType,
    pub id: Url,
    pub preferred_username: String,
    pub inbox: Url,
    pub outbox: Url,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<Url>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<Url>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<ApEndpoints>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<ApPublicKey>,

    #[serde(default)]
    pub manually_approves_followers: bool,

    #[serde(default = "default_discoverable")]
    pub discoverable: bool,
}

const fn default_discoverable() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApEndpoints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_inbox: Option<Url>,
}

/// `ActivityPub` public key.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApPublicKey {
    pub id: String,
    pub owner: Url,
    pub public_key_pem: String,
}

impl ApPerson {
    /// Shared inbox advertised by the actor, if any.
    #[must_use]
    pub fn shared_inbox(&self) -> Option<&Url> {
        self.endpoints.as_ref().and_then(|e| e.shared_inbox.as_ref())
    }

    /// Whether the actor is automated.
    #[must_use]
    pub const fn is_bot(&self) -> bool {
        matches!(self.kind, ApActorType::Service | ApActorType::Application)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_person_deserialization() {
        let json = r#"{
            "@context": ["https://www.w3.org/ns/activitystreams"],
            "type": "Service",
            "id": "https://remote.example/users/bot",
            "preferredUsername": "bot",
            "inbox": "https://remote.example/users/bot/inbox",
            "outbox": "https://remote.example/users/bot/outbox",
            "endpoints": { "sharedInbox": "https://remote.example/inbox" },
            "publicKey": {
                "id": "https://remote.example/users/bot#main-key",
                "owner": "https://remote.example/users/bot",
                "publicKeyPem": "PEM"
            },
            "manuallyApprovesFollowers": true
        }"#;

        let person: ApPerson = serde_json::from_str(json).unwrap();
        assert!(person.is_bot());
        assert!(person.manually_approves_followers);
        assert!(person.discoverable);
        assert_eq!(
            person.shared_inbox().unwrap().as_str(),
            "https://remote.example/inbox"
        );
        assert_eq!(person.public_key.unwrap().public_key_pem, "PEM");
    }
}
