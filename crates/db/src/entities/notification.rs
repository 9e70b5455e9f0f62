//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[sea_orm(string_value = "follow")]
    Follow,
    #[sea_orm(string_value = "follow_request")]
    FollowRequest,
    #[sea_orm(string_value = "mention")]
    Mention,
    #[sea_orm(string_value = "reblog")]
    Reblog,
    #[sea_orm(string_value = "favourite")]
    Favourite,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub kind: NotificationKind,

    /// Recipient
    #[sea_orm(indexed)]
    pub target_account_id: String,

    /// Account that caused the notification
    pub origin_account_id: String,

    #[sea_orm(nullable)]
    pub status_id: Option<String>,

    #[sea_orm(default_value = false)]
    pub read: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::TargetAccountId",
        to = "super::account::Column::Id",
        on_delete = "Cascade"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}
