//! Client API representations returned by the processors, and the input
//! forms they accept.

#![allow(missing_docs)]

use std::sync::LazyLock;

use plaza_db::entities::{notification::NotificationKind, status};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[allow(clippy::unwrap_used)]
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,64}$").unwrap());

#[allow(clippy::unwrap_used)]
static LOCALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{2,3}(-[a-zA-Z0-9]{2,8})*$").unwrap());

/// Audience of a status as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

impl From<status::Visibility> for Visibility {
    fn from(v: status::Visibility) -> Self {
        match v {
            status::Visibility::Public => Self::Public,
            status::Visibility::Unlisted => Self::Unlisted,
            status::Visibility::FollowersOnly => Self::Private,
            status::Visibility::Direct => Self::Direct,
        }
    }
}

impl From<Visibility> for status::Visibility {
    fn from(v: Visibility) -> Self {
        match v {
            Visibility::Public => Self::Public,
            Visibility::Unlisted => Self::Unlisted,
            Visibility::Private => Self::FollowersOnly,
            Visibility::Direct => Self::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub acct: String,
    pub display_name: String,
    pub note: String,
    pub url: Option<String>,
    pub locked: bool,
    pub bot: bool,
    pub discoverable: bool,
    pub suspended: bool,
    pub followers_count: usize,
    pub following_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mention {
    pub id: String,
    pub username: String,
    pub acct: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub content_type: String,
    pub size: i64,
    pub description: Option<String>,
}

/// A status, or a boost wrapping the boosted status in `reblog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub id: String,
    pub uri: String,
    pub url: Option<String>,
    pub created_at: String,
    pub account: Account,
    pub content: String,
    pub spoiler_text: String,
    pub visibility: Visibility,
    pub sensitive: bool,
    pub in_reply_to_id: Option<String>,
    pub in_reply_to_account_id: Option<String>,
    pub reblog: Option<Box<Status>>,
    pub media_attachments: Vec<Attachment>,
    pub mentions: Vec<Mention>,
    pub tags: Vec<Tag>,
    pub replies_count: usize,
    pub reblogs_count: usize,
    pub favourites_count: usize,
    pub favourited: bool,
    pub reblogged: bool,
    pub bookmarked: bool,
}

/// Ancestors (oldest first) and descendants of a status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Context {
    pub ancestors: Vec<Status>,
    pub descendants: Vec<Status>,
}

/// How the requesting account relates to another one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub id: String,
    pub following: bool,
    pub showing_reblogs: bool,
    pub notifying: bool,
    pub followed_by: bool,
    pub blocking: bool,
    pub blocked_by: bool,
    pub muting: bool,
    pub requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: String,
    pub account: Account,
    pub status: Option<Status>,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub id: String,
    pub action_taken: bool,
    pub action_taken_comment: Option<String>,
    pub comment: String,
    pub forwarded: bool,
    pub status_ids: Vec<String>,
    pub target_account: Account,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainBlock {
    pub id: String,
    pub domain: String,
    pub public_comment: Option<String>,
    pub private_comment: Option<String>,
    pub created_at: String,
}

/// Token-less result of a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub account: Account,
    /// Whether a moderator must approve the account before it can sign in.
    pub approval_pending: bool,
}

// ==================== Forms ====================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StatusCreateForm {
    /// Plain text body.
    pub status: Option<String>,
    #[serde(default)]
    pub media_ids: Vec<String>,
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
    pub spoiler_text: Option<String>,
    pub visibility: Option<Visibility>,
    /// Local-only when false.
    pub federated: Option<bool>,
    pub boostable: Option<bool>,
    pub replyable: Option<bool>,
    pub likeable: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AccountCreateForm {
    #[validate(regex(
        path = *USERNAME_RE,
        message = "username must be lowercase letters, digits or underscores"
    ))]
    pub username: String,
    #[validate(email(message = "not a valid email address"))]
    pub email: String,
    #[validate(length(max = 256, message = "password is too long"))]
    pub password: String,
    /// Why the user wants to join, required when registrations need approval.
    pub reason: Option<String>,
    #[validate(regex(path = *LOCALE_RE, message = "not a valid locale"))]
    pub locale: String,
    #[serde(default)]
    pub agreement: bool,
}

/// Profile fields a local account may change. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AccountUpdateForm {
    #[validate(length(max = 64, message = "display name is too long"))]
    pub display_name: Option<String>,
    #[validate(length(max = 5000, message = "note is too long"))]
    pub note: Option<String>,
    pub locked: Option<bool>,
    pub bot: Option<bool>,
    pub discoverable: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PasswordChangeForm {
    pub old_password: String,
    #[validate(length(max = 256, message = "password is too long"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MediaUpdateForm {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReportCreateForm {
    pub account_id: String,
    #[serde(default)]
    pub status_ids: Vec<String>,
    #[validate(length(max = 1000, message = "comment is too long"))]
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub forward: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DomainBlockCreateForm {
    #[validate(length(min = 1, max = 253, message = "domain is required"))]
    pub domain: String,
    #[validate(length(max = 500))]
    pub public_comment: Option<String>,
    #[validate(length(max = 500))]
    pub private_comment: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registration() -> AccountCreateForm {
        AccountCreateForm {
            username: "alice".to_string(),
            email: "alice@plaza.example".to_string(),
            password: "correct horse battery staple".to_string(),
            reason: None,
            locale: "en-GB".to_string(),
            agreement: true,
        }
    }

    #[test]
    fn test_registration_form_validation() {
        assert!(registration().validate().is_ok());

        let form = AccountCreateForm {
            username: "Alice!".to_string(),
            ..registration()
        };
        assert!(form.validate().is_err());

        let form = AccountCreateForm {
            email: "not-an-email".to_string(),
            ..registration()
        };
        assert!(form.validate().is_err());

        let form = AccountCreateForm {
            locale: "english please".to_string(),
            ..registration()
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_visibility_names() {
        let json = serde_json::to_value(Visibility::from(status::Visibility::FollowersOnly)).unwrap();
        assert_eq!(json, "private");
        assert_eq!(
            status::Visibility::from(Visibility::Unlisted),
            status::Visibility::Unlisted
        );
    }
}
