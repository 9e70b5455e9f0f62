//! Follow request entity (pending follows of locked accounts).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow_request")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub uri: String,

    /// The requester
    #[sea_orm(indexed)]
    pub account_id: String,

    /// The account whose approval is awaited
    #[sea_orm(indexed)]
    pub target_account_id: String,

    #[sea_orm(default_value = true)]
    pub show_reblogs: bool,

    #[sea_orm(default_value = false)]
    pub notify: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// The follow edge created when this request is accepted.
    #[must_use]
    pub fn into_follow(self) -> super::follow::Model {
        super::follow::Model {
            id: self.id,
            uri: self.uri,
            account_id: self.account_id,
            target_account_id: self.target_account_id,
            show_reblogs: self.show_reblogs,
            notify: self.notify,
            created_at: self.created_at,
        }
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
    Requester,

    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::TargetAccountId",
        to = "super::account::Column::Id",
        on_delete = "Cascade"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}
