//! Account entity (local and remote actors).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub username: String,

    /// NULL = local account, Some(host) = remote account
    #[sea_orm(nullable, indexed)]
    pub domain: Option<String>,

    #[sea_orm(nullable)]
    pub display_name: Option<String>,

    /// Profile bio (HTML)
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,

    /// `ActivityPub` actor ID
    #[sea_orm(unique)]
    pub uri: String,

    /// Human readable profile URL
    #[sea_orm(nullable)]
    pub url: Option<String>,

    pub inbox_uri: String,

    #[sea_orm(nullable)]
    pub shared_inbox_uri: Option<String>,

    pub outbox_uri: String,

    pub followers_uri: String,

    pub following_uri: String,

    #[sea_orm(column_type = "Text")]
    pub public_key_pem: String,

    /// Only present for local accounts.
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(skip_serializing)]
    pub private_key_pem: Option<String>,

    pub public_key_uri: String,

    /// Follows must be approved
    #[sea_orm(default_value = false)]
    pub locked: bool,

    #[sea_orm(default_value = false)]
    pub bot: bool,

    #[sea_orm(default_value = true)]
    pub discoverable: bool,

    #[sea_orm(nullable)]
    pub suspended_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether this account lives on this instance.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.domain.is_none()
    }

    /// Whether this account has been suspended.
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    /// `username` for local accounts, `username@domain` for remote ones.
    #[must_use]
    pub fn acct(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}@{domain}", self.username),
            None => self.username.clone(),
        }
    }

    /// Inbox deliveries to this account should go to.
    #[must_use]
    pub fn delivery_inbox(&self) -> &str {
        self.shared_inbox_uri.as_deref().unwrap_or(&self.inbox_uri)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::status::Entity")]
    Status,
}

impl Related<super::status::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Status.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
