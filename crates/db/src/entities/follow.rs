//! Follow entity (accepted follow edges).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// URI of the Follow activity
    pub uri: String,

    /// The follower
    #[sea_orm(indexed)]
    pub account_id: String,

    /// The followed account
    #[sea_orm(indexed)]
    pub target_account_id: String,

    /// Show boosts from the target in home timelines
    #[sea_orm(default_value = true)]
    pub show_reblogs: bool,

    #[sea_orm(default_value = false)]
    pub notify: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id",
        on_delete = "Cascade"
    )]
    Follower,

    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::TargetAccountId",
        to = "super::account::Column::Id",
        on_delete = "Cascade"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}
