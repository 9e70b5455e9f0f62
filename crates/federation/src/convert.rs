//! Conversion of received `ActivityPub` objects into stored entities.

use chrono::Utc;
use plaza_common::{AppError, AppResult};
use plaza_db::entities::{account, status, status::Visibility};
use serde_json::json;

use crate::actors::ApPerson;
use crate::objects::{ApNote, PUBLIC_AUDIENCE};

/// Host (with port, if any) of an actor or object IRI.
pub fn domain_of(uri: &url::Url) -> AppResult<String> {
    let host = uri
        .host_str()
        .ok_or_else(|| AppError::BadRequest(format!("IRI without host: {uri}")))?;
    Ok(match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Build or refresh a remote account from its actor document.
///
/// `existing` keeps the stored ID and creation time on refresh.
pub fn account_from_person(
    id: String,
    person: &ApPerson,
    existing: Option<&account::Model>,
) -> AppResult<account::Model> {
    let public_key = person
        .public_key
        .as_ref()
        .ok_or_else(|| AppError::Federation(format!("actor {} has no public key", person.id)))?;
    let now = Utc::now().fixed_offset();

    Ok(account::Model {
        id: existing.map_or(id, |a| a.id.clone()),
        username: person.preferred_username.clone(),
        domain: Some(domain_of(&person.id)?),
        display_name: person.name.clone(),
        note: person.summary.clone(),
        uri: person.id.to_string(),
        url: person.url.as_ref().map(ToString::to_string),
        inbox_uri: person.inbox.to_string(),
        shared_inbox_uri: person.shared_inbox().map(ToString::to_string),
        outbox_uri: person.outbox.to_string(),
        followers_uri: person
            .followers
            .as_ref()
            .map_or_else(|| format!("{}/followers", person.id), ToString::to_string),
        following_uri: person
            .following
            .as_ref()
            .map_or_else(|| format!("{}/following", person.id), ToString::to_string),
        public_key_pem: public_key.public_key_pem.clone(),
        private_key_pem: None,
        public_key_uri: public_key.id.clone(),
        locked: person.manually_approves_followers,
        bot: person.is_bot(),
        discoverable: person.discoverable,
        suspended_at: existing.and_then(|a| a.suspended_at),
        created_at: existing.map_or(now, |a| a.created_at),
        updated_at: existing.map(|_| now),
    })
}

/// Derive the visibility level from a note's addressing.
#[must_use]
pub fn visibility_of(note: &ApNote, author: &account::Model) -> Visibility {
    if note.is_public_to() {
        Visibility::Public
    } else if note.is_addressed_to_public() {
        Visibility::Unlisted
    } else if note
        .to
        .iter()
        .chain(&note.cc)
        .any(|u| u.as_str() == author.followers_uri)
    {
        Visibility::FollowersOnly
    } else {
        Visibility::Direct
    }
}

/// References of a received note resolved against local storage.
#[derive(Debug, Default, Clone)]
pub struct NoteRefs {
    pub in_reply_to: Option<status::Model>,
    pub mention_account_ids: Vec<String>,
}

/// Build a remote status from a received note.
#[must_use]
pub fn status_from_note(
    id: String,
    note: &ApNote,
    author: &account::Model,
    refs: NoteRefs,
) -> status::Model {
    let tags: Vec<String> = note
        .tag
        .iter()
        .filter(|t| t.kind == "Hashtag")
        .filter_map(|t| t.name.as_deref())
        .map(|name| name.trim_start_matches('#').to_lowercase())
        .collect();

    status::Model {
        id,
        uri: note.id.to_string(),
        url: note.url.as_ref().map(ToString::to_string),
        content: note.content.clone(),
        content_warning: note.summary.clone().filter(|s| !s.is_empty()),
        visibility: visibility_of(note, author),
        sensitive: note.sensitive,
        local: false,
        account_id: author.id.clone(),
        account_uri: author.uri.clone(),
        in_reply_to_id: refs.in_reply_to.as_ref().map(|s| s.id.clone()),
        in_reply_to_account_id: refs.in_reply_to.as_ref().map(|s| s.account_id.clone()),
        in_reply_to_uri: note.in_reply_to.as_ref().map(ToString::to_string),
        boost_of_id: None,
        boost_of_account_id: None,
        mention_account_ids: json!(refs.mention_account_ids),
        attachment_ids: json!([]),
        tags: json!(tags),
        federated: true,
        boostable: true,
        replyable: true,
        likeable: true,
        created_at: note.published.fixed_offset(),
        updated_at: None,
    }
}

/// Whether an addressing list names the public collection.
#[must_use]
pub fn addresses_public(audience: &[url::Url]) -> bool {
    audience.iter().any(|u| u.as_str() == PUBLIC_AUDIENCE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use url::Url;

    fn person() -> ApPerson {
        serde_json::from_value(json!({
            "type": "Person",
            "id": "https://remote.example:8443/users/bob",
            "preferredUsername": "bob",
            "inbox": "https://remote.example:8443/users/bob/inbox",
            "outbox": "https://remote.example:8443/users/bob/outbox",
            "followers": "https://remote.example:8443/users/bob/followers",
            "publicKey": {
                "id": "https://remote.example:8443/users/bob#main-key",
                "owner": "https://remote.example:8443/users/bob",
                "publicKeyPem": "PEM"
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_account_from_person() {
        let account = account_from_person("01a".to_string(), &person(), None).unwrap();
        assert_eq!(account.domain.as_deref(), Some("remote.example:8443"));
        assert_eq!(account.acct(), "bob@remote.example:8443");
        assert_eq!(account.public_key_uri, "https://remote.example:8443/users/bob#main-key");
        assert!(!account.is_local());
        assert!(account.updated_at.is_none());

        let refreshed = account_from_person("01b".to_string(), &person(), Some(&account)).unwrap();
        assert_eq!(refreshed.id, "01a");
        assert!(refreshed.updated_at.is_some());
    }

    #[test]
    fn test_visibility_from_addressing() {
        let author = account_from_person("01a".to_string(), &person(), None).unwrap();
        let public = Url::parse(PUBLIC_AUDIENCE).unwrap();
        let followers = Url::parse(&author.followers_uri).unwrap();
        let mut note = ApNote::new(
            Url::parse("https://remote.example:8443/notes/1").unwrap(),
            Url::parse(&author.uri).unwrap(),
            "hi".to_string(),
            Utc::now(),
        );

        assert_eq!(visibility_of(&note, &author), Visibility::Direct);
        note.to = vec![followers.clone()];
        assert_eq!(visibility_of(&note, &author), Visibility::FollowersOnly);
        note.cc = vec![public.clone()];
        assert_eq!(visibility_of(&note, &author), Visibility::Unlisted);
        note.to = vec![public];
        assert_eq!(visibility_of(&note, &author), Visibility::Public);
    }

    #[test]
    fn test_status_from_note_tags() {
        let author = account_from_person("01a".to_string(), &person(), None).unwrap();
        let mut note = ApNote::new(
            Url::parse("https://remote.example:8443/notes/1").unwrap(),
            Url::parse(&author.uri).unwrap(),
            "hi".to_string(),
            Utc::now(),
        );
        note.tag = vec![crate::objects::ApTag::hashtag(None, "Rust")];

        let status = status_from_note("01s".to_string(), &note, &author, NoteRefs::default());
        assert_eq!(status.tag_list(), vec!["rust"]);
        assert!(!status.local);
        assert_eq!(status.account_id, "01a");
    }
}
