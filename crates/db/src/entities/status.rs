//! Status entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audience scope of a status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[sea_orm(string_value = "public")]
    Public,
    #[sea_orm(string_value = "unlisted")]
    Unlisted,
    #[sea_orm(string_value = "followers_only")]
    FollowersOnly,
    #[sea_orm(string_value = "direct")]
    Direct,
}

impl Visibility {
    /// Public and unlisted statuses are visible to anyone not blocked.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Public | Self::Unlisted)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub uri: String,

    #[sea_orm(nullable)]
    pub url: Option<String>,

    /// Rendered HTML content
    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(nullable)]
    pub content_warning: Option<String>,

    pub visibility: Visibility,

    #[sea_orm(default_value = false)]
    pub sensitive: bool,

    #[sea_orm(default_value = true)]
    pub local: bool,

    /// Author account ID
    #[sea_orm(indexed)]
    pub account_id: String,

    pub account_uri: String,

    #[sea_orm(nullable, indexed)]
    pub in_reply_to_id: Option<String>,

    #[sea_orm(nullable)]
    pub in_reply_to_account_id: Option<String>,

    #[sea_orm(nullable)]
    pub in_reply_to_uri: Option<String>,

    /// Boosted status ID
    #[sea_orm(nullable, indexed)]
    pub boost_of_id: Option<String>,

    #[sea_orm(nullable)]
    pub boost_of_account_id: Option<String>,

    /// Mentioned account IDs
    #[sea_orm(column_type = "JsonBinary")]
    pub mention_account_ids: Json,

    /// Attached media IDs
    #[sea_orm(column_type = "JsonBinary")]
    pub attachment_ids: Json,

    /// Lowercased hashtags without '#'
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,

    #[sea_orm(default_value = true)]
    pub federated: bool,

    #[sea_orm(default_value = true)]
    pub boostable: bool,

    #[sea_orm(default_value = true)]
    pub replyable: bool,

    #[sea_orm(default_value = true)]
    pub likeable: bool,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

fn string_list(value: &Json) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl Model {
    /// IDs of mentioned accounts.
    #[must_use]
    pub fn mention_ids(&self) -> Vec<String> {
        string_list(&self.mention_account_ids)
    }

    /// Whether `account_id` is mentioned by this status.
    #[must_use]
    pub fn mentions(&self, account_id: &str) -> bool {
        self.mention_account_ids
            .as_array()
            .is_some_and(|ids| ids.iter().any(|v| v.as_str() == Some(account_id)))
    }

    /// IDs of attached media.
    #[must_use]
    pub fn attachment_id_list(&self) -> Vec<String> {
        string_list(&self.attachment_ids)
    }

    /// Hashtags used by this status.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        string_list(&self.tags)
    }

    /// Whether this status is a boost of another one.
    #[must_use]
    pub const fn is_boost(&self) -> bool {
        self.boost_of_id.is_some()
    }

    /// Whether this status replies to another one.
    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some() || self.in_reply_to_uri.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id",
        on_delete = "Cascade"
    )]
    Account,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::InReplyToId",
        to = "Column::Id",
        on_delete = "SetNull"
    )]
    InReplyTo,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::BoostOfId",
        to = "Column::Id",
        on_delete = "Cascade"
    )]
    BoostOf,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
